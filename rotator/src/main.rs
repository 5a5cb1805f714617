//! Main entry point for the rotator binary
//!
//! Reads newline-delimited records from stdin, delivers them to a rotating
//! worker process and writes one output line per record to stdout. Logs go
//! to stderr.

use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;

use rotator::{Rotator, RotatorError, RotatorResult, WorkerFactory};
use shared::{logging, process_debug, process_info, ProcessId, ReadinessSignal, RotatorConfig, WorkerConfig};

/// Supervisor that keeps records flowing into a periodically replaced worker process
#[derive(Parser)]
#[command(name = "rotator")]
#[command(about = "Feeds stdin records to a rotating worker process")]
pub struct Args {
    /// JSON configuration file; command line flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker executable
    #[arg(long)]
    pub command: Option<String>,

    /// Worker argument, may be repeated. `{tenant}` and `{topic}` are substituted
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Tenant the workers publish for
    #[arg(long)]
    pub tenant: Option<String>,

    /// Worker lifetime in seconds
    #[arg(long)]
    pub expires_in: Option<u64>,

    /// Records per delivered batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Health check interval in milliseconds
    #[arg(long)]
    pub health_interval_ms: Option<u64>,

    /// Abandon a replacement worker that is not ready after this many seconds
    #[arg(long)]
    pub readiness_timeout: Option<u64>,

    /// Treat this exact stdout line as readiness instead of the JSON ready message
    #[arg(long)]
    pub ready_token: Option<String>,

    /// Print delivery stats instead of echoing records
    #[arg(long)]
    pub emit_stats: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Merge the configuration file (if any) with command line overrides
    fn into_config(self) -> RotatorResult<RotatorConfig> {
        let mut config = match &self.config {
            Some(path) => RotatorConfig::from_json_file(path)?,
            None => {
                let command = self
                    .command
                    .clone()
                    .ok_or_else(|| RotatorError::config("--command is required without --config"))?;
                let tenant = self
                    .tenant
                    .clone()
                    .ok_or_else(|| RotatorError::config("--tenant is required without --config"))?;
                RotatorConfig::new(WorkerConfig::new(command, tenant))
            }
        };

        if let Some(command) = self.command {
            config.worker.command = command;
        }
        if !self.args.is_empty() {
            config.worker.command_arguments = self.args;
        }
        if let Some(tenant) = self.tenant {
            config.worker.tenant = tenant;
        }
        if let Some(expires_in) = self.expires_in {
            config.worker.expires_in_secs = expires_in;
        }
        if let Some(token) = self.ready_token {
            config.worker.readiness = ReadinessSignal::Token(token);
        }
        if let Some(interval) = self.health_interval_ms {
            config.supervisor.health_check_interval_ms = interval;
        }
        if let Some(timeout) = self.readiness_timeout {
            config.supervisor.readiness_timeout_secs = Some(timeout);
        }
        if let Some(batch_size) = self.batch_size {
            config.pipeline.batch_size = batch_size;
        }
        if self.emit_stats {
            config.pipeline.emit_stats = true;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> RotatorResult<()> {
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    let config = args.into_config()?;
    logging::log_startup(&ProcessId::Supervisor, &format!("rotator for tenant {}", config.worker.tenant));
    process_debug!(
        ProcessId::Supervisor,
        "Command: {} {:?}, expires in {}s, batch size {}",
        config.worker.command,
        config.worker.command_arguments,
        config.worker.expires_in_secs,
        config.pipeline.batch_size
    );

    let mut rotator = Rotator::from_config(config).await?;

    // Report every completed rotation
    let mut topic_rx = rotator.subscribe_topic();
    tokio::spawn(async move {
        while topic_rx.changed().await.is_ok() {
            let topic = topic_rx.borrow_and_update().clone();
            if let Some(topic) = topic {
                process_info!(ProcessId::Supervisor, "📡 Active topic is now {}", topic);
            }
        }
    });

    rotator.start();

    let pumped = pump(&rotator, tokio::io::stdin(), tokio::io::stdout(), signal::ctrl_c()).await;
    if let Err(e) = &pumped {
        logging::log_error(&ProcessId::Supervisor, "Record relay", e);
    }

    // Workers are torn down even when the relay failed
    rotator.shutdown().await?;
    pumped?;

    logging::log_success(&ProcessId::Supervisor, "Rotator stopped gracefully");
    Ok(())
}

/// Relay records from `input` through the rotator to `output`
///
/// Returns on end of input or once `interrupt` completes. An output error
/// ends the relay and is returned to the caller.
async fn pump<F, R, W, S>(rotator: &Rotator<F>, input: R, mut output: W, interrupt: S) -> RotatorResult<()>
where
    F: WorkerFactory + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = std::io::Result<()>>,
{
    let mut lines = BufReader::new(input).lines();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(record)) => {
                        let mut rendered = rotator.accept(record).await.render()?;
                        rendered.push('\n');
                        output.write_all(rendered.as_bytes()).await?;
                        output.flush().await?;
                    }
                    Ok(None) => {
                        logging::log_shutdown(&ProcessId::Supervisor, "Input closed");
                        return Ok(());
                    }
                    Err(e) => {
                        logging::log_error(&ProcessId::Supervisor, "Reading input", &e);
                        return Ok(());
                    }
                }
            }
            result = &mut interrupt => {
                match result {
                    Ok(()) => logging::log_shutdown(&ProcessId::Supervisor, "Received Ctrl+C signal"),
                    Err(e) => logging::log_error(&ProcessId::Supervisor, "Signal handling", &e),
                }
                return Ok(());
            }
        }
    }
}
