//! Test helpers and builder patterns for rotator tests

use std::path::Path;
use std::time::Duration;

use rotator::core::{RotationSupervisor, TickOutcome};
use rotator::Rotator;
use shared::{RotatorConfig, SupervisorSettings, WorkerConfig};

use super::fixtures::{FakeFactory, TestFixtures};

/// Builder for rotators backed by fake workers
pub struct RotatorBuilder {
    factory: FakeFactory,
    config: RotatorConfig,
}

impl RotatorBuilder {
    pub fn new(factory: FakeFactory) -> Self {
        Self {
            factory,
            config: TestFixtures::config(1),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.pipeline.batch_size = batch_size;
        self
    }

    pub fn with_stats(mut self) -> Self {
        self.config.pipeline.emit_stats = true;
        self
    }

    pub fn with_readiness_timeout_secs(mut self, secs: u64) -> Self {
        self.config.supervisor.readiness_timeout_secs = Some(secs);
        self
    }

    pub async fn build(self) -> Rotator<FakeFactory> {
        Rotator::with_factory(self.factory, &self.config).await.unwrap()
    }
}

/// Common helper functions
pub struct TestHelpers;

impl TestHelpers {
    /// Upper bound for anything a real worker process has to do
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub async fn supervisor(factory: FakeFactory, settings: SupervisorSettings) -> RotationSupervisor<FakeFactory> {
        RotationSupervisor::new(factory, settings).await
    }

    /// Tick until the outcome is a promotion, at most `max_ticks` times
    pub async fn tick_until_promoted(supervisor: &RotationSupervisor<FakeFactory>, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            if matches!(supervisor.tick().await, TickOutcome::Promoted { .. }) {
                return true;
            }
        }
        false
    }

    /// Poll `condition` until it holds or [`Self::TEST_TIMEOUT`] elapses
    pub async fn wait_until<F>(mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + Self::TEST_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    /// Real `/bin/sh` worker that announces readiness for its topic and
    /// appends every record to `<dir>/<topic>.log`
    pub fn logging_shell_config(dir: &Path, expires_in_secs: u64, batch_size: usize) -> RotatorConfig {
        let script = r#"printf '{"type":"ready","topic":"%s"}\n' "$2"; exec cat >> "$0/$2.log""#;
        let worker = WorkerConfig::new("/bin/sh", TestFixtures::TENANT)
            .with_arguments(["-c".to_string(), script.to_string(), dir.display().to_string()])
            .with_expires_in_secs(expires_in_secs);

        let mut config = RotatorConfig::new(worker);
        config.supervisor = TestFixtures::settings();
        config.pipeline.batch_size = batch_size;
        config
    }

    /// Contents of the log written by the worker assigned `topic`
    pub fn worker_log(dir: &Path, topic: &str) -> String {
        std::fs::read_to_string(dir.join(format!("{topic}.log"))).unwrap_or_default()
    }
}
