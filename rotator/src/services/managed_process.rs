//! Real worker process backed by a tokio child process
//!
//! Spawns the configured command, pipes its stdin for record injection and
//! hands stdout, stderr and the child itself to background tasks (see
//! [`output_handler`](super::output_handler)) that track readiness and exit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};

use shared::{process_debug, process_info, process_warn, ProcessId, WorkerConfig, WorkerTopic};

use super::output_handler::{monitor_exit, relay_stderr, watch_stdout, ProcessFlags};
use crate::error::{RotatorError, RotatorResult};
use crate::traits::Worker;

/// Handle for one supervised worker process
pub struct ManagedProcess {
    pid: Option<u32>,
    topic: WorkerTopic,
    created_at: DateTime<Utc>,
    expires_in: Duration,
    write_timeout: Duration,
    flags: Arc<ProcessFlags>,
    stdin: Mutex<Option<ChildStdin>>,
    terminate_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ManagedProcess {
    /// Start the worker described by `config` under a freshly generated topic
    ///
    /// Must be called from within a tokio runtime. The returned process is
    /// running but not necessarily ready.
    pub fn spawn(config: &WorkerConfig) -> RotatorResult<Self> {
        let created_at = Utc::now();
        let topic = WorkerTopic::generate(&config.tenant, created_at);
        let arguments = config.build_arguments(&topic);

        let mut cmd = Command::new(&config.command);
        cmd.args(&arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RotatorError::SpawnFailed {
            command: config.command.clone(),
            source,
        })?;

        let pid = child.id();
        let flags = Arc::new(ProcessFlags::default());
        let stdin = child.stdin.take();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(watch_stdout(stdout, config.readiness.clone(), topic.clone(), flags.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_stderr(stderr, topic.clone()));
        }

        let (terminate_tx, terminate_rx) = oneshot::channel();
        tokio::spawn(monitor_exit(
            child,
            terminate_rx,
            flags.clone(),
            topic.clone(),
            config.termination_grace(),
        ));

        process_info!(
            ProcessId::worker(&topic),
            "🏭 Spawned `{}` (PID: {})",
            config.command,
            pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            pid,
            topic,
            created_at,
            expires_in: config.expires_in(),
            write_timeout: config.write_timeout(),
            flags,
            stdin: Mutex::new(stdin),
            terminate_tx: Mutex::new(Some(terminate_tx)),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn topic(&self) -> &WorkerTopic {
        &self.topic
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry relative to an explicit clock reading
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        lifetime_exceeded(self.created_at, self.expires_in, now)
    }
}

/// `now - created_at > expires_in`; a clock that went backwards never expires
pub(crate) fn lifetime_exceeded(created_at: DateTime<Utc>, expires_in: Duration, now: DateTime<Utc>) -> bool {
    match (now - created_at).to_std() {
        Ok(elapsed) => elapsed > expires_in,
        Err(_) => false,
    }
}

#[async_trait]
impl Worker for ManagedProcess {
    fn topic_name(&self) -> WorkerTopic {
        self.topic.clone()
    }

    fn is_spawned(&self) -> bool {
        self.flags.is_spawned()
    }

    fn is_killed(&self) -> bool {
        self.flags.is_killed()
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    async fn inject(&self, data: &str) -> RotatorResult<()> {
        if self.flags.is_killed() {
            return Err(RotatorError::ProcessKilled {
                topic: self.topic.clone(),
            });
        }

        let mut stdin = self.stdin.lock().await;
        let pipe = stdin.as_mut().ok_or_else(|| RotatorError::InputClosed {
            topic: self.topic.clone(),
        })?;

        let mut record = String::with_capacity(data.len() + 1);
        record.push_str(data);
        record.push('\n');

        let result = match tokio::time::timeout(self.write_timeout, pipe.write_all(record.as_bytes())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(RotatorError::InjectFailed {
                topic: self.topic.clone(),
                source,
            }),
            Err(_) => Err(RotatorError::InjectTimeout {
                topic: self.topic.clone(),
                timeout: self.write_timeout,
            }),
        };

        if let Err(e) = &result {
            // Part of the record may already be in the pipe; nothing may follow it
            stdin.take();
            process_warn!(
                ProcessId::worker(&self.topic),
                "✂️ Closed worker input after a broken write: {}",
                e
            );
        }

        result
    }

    async fn terminate(&self) {
        let first_request = self.flags.mark_terminating();

        // Dropping stdin closes the pipe: no more input
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(terminate_tx) = self.terminate_tx.lock().await.take() {
            // The monitor is gone once the process has already exited
            let _ = terminate_tx.send(());
        }

        if first_request {
            process_debug!(ProcessId::worker(&self.topic), "Termination requested");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lifetime_not_exceeded_at_creation() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(!lifetime_exceeded(created_at, Duration::from_secs(10), created_at));
        assert!(!lifetime_exceeded(created_at, Duration::ZERO, created_at));
    }

    #[test]
    fn test_lifetime_exceeded_strictly_after_budget() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let budget = Duration::from_secs(10);

        assert!(!lifetime_exceeded(created_at, budget, created_at + chrono::Duration::seconds(10)));
        assert!(lifetime_exceeded(
            created_at,
            budget,
            created_at + chrono::Duration::milliseconds(10_001)
        ));
        assert!(lifetime_exceeded(created_at, budget, created_at + chrono::Duration::hours(1)));
    }

    #[test]
    fn test_zero_budget_expires_after_any_time() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(lifetime_exceeded(
            created_at,
            Duration::ZERO,
            created_at + chrono::Duration::nanoseconds(1)
        ));
    }

    #[test]
    fn test_clock_going_backwards_never_expires() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(!lifetime_exceeded(
            created_at,
            Duration::ZERO,
            created_at - chrono::Duration::seconds(5)
        ));
    }
}
