//! Message types for the rotating worker supervisor
//!
//! - `worker`: worker -> supervisor control protocol
//! - `config`: configuration for the worker, supervisor and pipeline

pub mod config;
pub mod worker;

pub use config::{PipelineConfig, RotatorConfig, SupervisorSettings, WorkerConfig};
pub use worker::{ReadinessSignal, WorkerMessage};
