//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Topic a worker instance publishes its results under
///
/// Built from the tenant and the worker's creation time. A short random
/// suffix keeps two workers spawned within the same millisecond apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerTopic(String);

impl WorkerTopic {
    pub fn generate(tenant: &str, created_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}_{}", tenant, created_at.timestamp_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerTopic {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkerTopic {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkerTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the emitter of a log event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The supervising host process
    Supervisor,
    /// A spawned worker, known by its topic
    Worker(WorkerTopic),
}

impl ProcessId {
    pub fn worker(topic: &WorkerTopic) -> Self {
        ProcessId::Worker(topic.clone())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Supervisor => write!(f, "supervisor"),
            ProcessId::Worker(topic) => write!(f, "worker[{topic}]"),
        }
    }
}

/// Externally visible phase of a rotation supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    /// No worker has been promoted and none is warming up
    Idle,
    /// A single active worker serves traffic
    Active,
    /// A candidate is warming up; the active worker (if any) keeps serving
    Transitioning,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorPhase::Idle => write!(f, "idle"),
            SupervisorPhase::Active => write!(f, "active"),
            SupervisorPhase::Transitioning => write!(f, "transitioning"),
        }
    }
}
