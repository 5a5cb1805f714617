//! Helpers that own a worker's output streams and exit status
//!
//! Every piped stream is drained until EOF so a worker never blocks on a
//! full pipe:
//! - stdout is scanned for the readiness signal, later lines are relayed to
//!   the log at debug level
//! - stderr is relayed to the log
//! - the exit monitor owns the `Child`, performs termination on request and
//!   records the exit

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use shared::{process_debug, process_info, process_warn, ProcessId, ReadinessSignal, WorkerTopic};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;

/// Lifecycle flags shared between a worker handle and its background tasks
///
/// Each flag only ever goes from `false` to `true`.
#[derive(Debug, Default)]
pub struct ProcessFlags {
    spawned: AtomicBool,
    killed: AtomicBool,
    terminating: AtomicBool,
}

impl ProcessFlags {
    pub fn is_spawned(&self) -> bool {
        self.spawned.load(Ordering::Acquire)
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::Acquire)
    }

    /// Returns true if this call performed the transition
    pub fn mark_spawned(&self) -> bool {
        !self.spawned.swap(true, Ordering::AcqRel)
    }

    pub fn mark_killed(&self) -> bool {
        !self.killed.swap(true, Ordering::AcqRel)
    }

    pub fn mark_terminating(&self) -> bool {
        !self.terminating.swap(true, Ordering::AcqRel)
    }
}

/// Scan stdout for the readiness signal, then keep draining it
pub async fn watch_stdout<R>(stdout: R, readiness: ReadinessSignal, topic: WorkerTopic, flags: std::sync::Arc<ProcessFlags>)
where
    R: AsyncRead + Unpin,
{
    let process_id = ProcessId::worker(&topic);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if flags.is_spawned() {
                    process_debug!(process_id, "📤 {}", line);
                } else if readiness.matches(&line, &topic) {
                    if flags.mark_spawned() {
                        process_info!(process_id, "✅ Worker signalled readiness");
                    }
                } else {
                    process_debug!(process_id, "Ignoring output before readiness: {}", line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                process_warn!(process_id, "⚠️ Stopped reading worker stdout: {}", e);
                break;
            }
        }
    }
}

/// Relay stderr lines to the log
pub async fn relay_stderr<R>(stderr: R, topic: WorkerTopic)
where
    R: AsyncRead + Unpin,
{
    let process_id = ProcessId::worker(&topic);
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        process_warn!(process_id, "stderr: {}", line);
    }
}

/// Own the child until it exits, terminating it when asked
///
/// A termination request is a message on `terminate_rx` or the sender being
/// dropped together with its worker handle.
pub async fn monitor_exit(
    mut child: Child,
    terminate_rx: oneshot::Receiver<()>,
    flags: std::sync::Arc<ProcessFlags>,
    topic: WorkerTopic,
    grace: Duration,
) {
    let process_id = ProcessId::worker(&topic);

    let status = tokio::select! {
        status = child.wait() => status,
        _ = terminate_rx => {
            flags.mark_terminating();
            if let Err(e) = request_termination(&mut child) {
                process_debug!(process_id, "Termination signal not delivered: {}", e);
            }
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    process_warn!(process_id, "⏱️ Worker ignored termination for {:?}, killing", grace);
                    let _ = child.start_kill();
                    child.wait().await
                }
            }
        }
    };

    flags.mark_killed();

    match status {
        Ok(status) if flags.is_terminating() => {
            process_info!(process_id, "🛑 Worker exited after termination ({})", describe_exit(&status));
        }
        Ok(status) => {
            process_warn!(
                process_id,
                "💀 Worker exited unexpectedly ({}); records still queued for it are lost",
                describe_exit(&status)
            );
        }
        Err(e) => {
            process_warn!(process_id, "❌ Failed to observe worker exit: {}", e);
        }
    }
}

/// Ask the child to exit: SIGTERM on unix, a hard kill elsewhere
#[cfg(unix)]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(std::io::Error::from),
        // Already reaped
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// Human readable exit code or signal
pub fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("code {code}");
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {signal}");
        }
    }

    "unknown status".to_string()
}
