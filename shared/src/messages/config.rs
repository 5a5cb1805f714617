//! Configuration types
//!
//! Types for configuring the worker command, the rotation supervisor and the
//! delivery pipeline. A full [`RotatorConfig`] can be loaded from JSON; every
//! section except `worker` falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::worker::ReadinessSignal;
use crate::errors::{SharedError, SharedResult};
use crate::types::WorkerTopic;

const TENANT_PLACEHOLDER: &str = "{tenant}";
const TOPIC_PLACEHOLDER: &str = "{topic}";

fn default_expires_in_secs() -> u64 {
    3600
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_termination_grace_ms() -> u64 {
    2000
}

fn default_health_check_interval_ms() -> u64 {
    5000
}

fn default_replace_dead_active() -> bool {
    true
}

fn default_batch_size() -> usize {
    1
}

/// Worker command configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    pub command: String,
    #[serde(default)]
    pub command_arguments: Vec<String>,
    pub tenant: String,
    #[serde(default = "default_expires_in_secs")]
    pub expires_in_secs: u64,
    #[serde(default)]
    pub readiness: ReadinessSignal,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_termination_grace_ms")]
    pub termination_grace_ms: u64,
}

impl WorkerConfig {
    pub fn new(command: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            command_arguments: Vec::new(),
            tenant: tenant.into(),
            expires_in_secs: default_expires_in_secs(),
            readiness: ReadinessSignal::default(),
            write_timeout_ms: default_write_timeout_ms(),
            termination_grace_ms: default_termination_grace_ms(),
        }
    }

    /// Configure command arguments (fluent API)
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Configure worker lifetime (fluent API)
    pub fn with_expires_in_secs(mut self, expires_in_secs: u64) -> Self {
        self.expires_in_secs = expires_in_secs;
        self
    }

    /// Configure readiness detection (fluent API)
    pub fn with_readiness(mut self, readiness: ReadinessSignal) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    /// Argument list for a worker assigned `topic`
    ///
    /// `{tenant}` and `{topic}` placeholders are substituted. Without any
    /// placeholder, tenant and topic are appended in that order.
    pub fn build_arguments(&self, topic: &WorkerTopic) -> Vec<String> {
        let templated = self
            .command_arguments
            .iter()
            .any(|arg| arg.contains(TENANT_PLACEHOLDER) || arg.contains(TOPIC_PLACEHOLDER));

        if templated {
            self.command_arguments
                .iter()
                .map(|arg| {
                    arg.replace(TENANT_PLACEHOLDER, &self.tenant)
                        .replace(TOPIC_PLACEHOLDER, topic.as_str())
                })
                .collect()
        } else {
            let mut arguments = self.command_arguments.clone();
            arguments.push(self.tenant.clone());
            arguments.push(topic.to_string());
            arguments
        }
    }
}

/// Rotation supervisor settings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SupervisorSettings {
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Give up on a candidate that has not signalled readiness in time.
    /// Unset keeps the old worker serving for as long as it takes.
    #[serde(default)]
    pub readiness_timeout_secs: Option<u64>,
    #[serde(default = "default_replace_dead_active")]
    pub replace_dead_active: bool,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            health_check_interval_ms: default_health_check_interval_ms(),
            readiness_timeout_secs: None,
            replace_dead_active: default_replace_dead_active(),
        }
    }
}

impl SupervisorSettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_secs.map(Duration::from_secs)
    }
}

/// Batch delivery settings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Report delivery stats to the host instead of passing records through
    #[serde(default)]
    pub emit_stats: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            emit_stats: false,
        }
    }
}

/// Complete configuration handed over by the host
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RotatorConfig {
    pub worker: WorkerConfig,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl RotatorConfig {
    pub fn new(worker: WorkerConfig) -> Self {
        Self {
            worker,
            supervisor: SupervisorSettings::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> SharedResult<Self> {
        serde_json::from_str(json).map_err(|e| SharedError::DeserializationError { message: e.to_string() })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SharedResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SharedError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the supervisor cannot run with
    pub fn validate(&self) -> SharedResult<()> {
        if self.worker.command.trim().is_empty() {
            return Err(SharedError::invalid_config("worker.command", &self.worker.command));
        }
        if self.worker.tenant.trim().is_empty() {
            return Err(SharedError::invalid_config("worker.tenant", &self.worker.tenant));
        }
        if self.worker.write_timeout_ms == 0 {
            return Err(SharedError::invalid_config("worker.write_timeout_ms", 0));
        }
        if self.supervisor.health_check_interval_ms == 0 {
            return Err(SharedError::invalid_config("supervisor.health_check_interval_ms", 0));
        }
        if self.pipeline.batch_size == 0 {
            return Err(SharedError::invalid_config("pipeline.batch_size", 0));
        }
        Ok(())
    }
}
