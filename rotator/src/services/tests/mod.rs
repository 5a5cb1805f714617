//! Service-specific tests
//!
//! These run real `/bin/sh` workers, so they only build on unix.


// Common test utilities for services
#[cfg(all(test, unix))]
pub mod common {
    use std::path::Path;
    use std::time::Duration;

    use shared::WorkerConfig;

    /// Upper bound for anything a worker process has to do
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Announces readiness for the assigned topic, then appends every record
    /// to `<dir>/<topic>.log`
    pub const READY_THEN_LOG: &str = r#"printf '{"type":"ready","topic":"%s"}\n' "$2"; exec cat >> "$0/$2.log""#;

    /// Poll `condition` until it holds or [`TEST_TIMEOUT`] elapses
    pub async fn wait_until<F>(mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    /// Worker running `script` under `sh -c`
    ///
    /// Inside the script `$0` is `dir`, `$1` the tenant and `$2` the topic.
    pub fn shell_worker(script: &str, dir: &Path) -> WorkerConfig {
        WorkerConfig::new("/bin/sh", "acme").with_arguments(["-c".to_string(), script.to_string(), dir.display().to_string()])
    }
}
