//! Rotator library for supervising a rotating worker process
//!
//! Feeds a stream of line-delimited records to a single external worker
//! process and periodically replaces that worker with a fresh one without
//! interrupting delivery. The old worker keeps receiving records until its
//! replacement has signalled readiness.

pub mod core;
pub mod error;
pub mod rotator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use crate::core::{BatchDeliveryPipeline, DeliveryStats, RotationSupervisor, SupervisorStatus, TickOutcome};
pub use error::{RotatorError, RotatorResult};
pub use rotator::{HostOutput, Rotator};
pub use services::{ManagedProcess, RealWorkerFactory};
pub use traits::{Worker, WorkerFactory, WorkerSource};
