//! Shared types for the rotating worker supervisor
//!
//! Contains the pieces a worker implementation and the supervisor both need:
//! the worker control protocol, configuration structs, identifiers, errors
//! and the logging setup.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{
    // Worker -> supervisor control protocol
    ReadinessSignal, WorkerMessage,

    // Configuration types
    PipelineConfig, RotatorConfig, SupervisorSettings, WorkerConfig,
};
