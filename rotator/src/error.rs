//! Rotator-specific error types

use shared::{SharedError, WorkerTopic};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RotatorError {
    #[error("Failed to spawn worker process `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {topic} has exited")]
    ProcessKilled { topic: WorkerTopic },

    #[error("Worker {topic} no longer accepts input")]
    InputClosed { topic: WorkerTopic },

    #[error("Write to worker {topic} did not complete within {timeout:?}")]
    InjectTimeout { topic: WorkerTopic, timeout: Duration },

    #[error("Write to worker {topic} failed: {source}")]
    InjectFailed {
        topic: WorkerTopic,
        #[source]
        source: std::io::Error,
    },

    #[error("No worker process available")]
    NoWorkerAvailable,

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Background task failed: {message}")]
    TaskFailed { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RotatorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }
}

pub type RotatorResult<T> = Result<T, RotatorError>;
