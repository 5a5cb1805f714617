//! Core rotation and delivery logic
//!
//! Works only against the worker traits; no process I/O happens here.

pub mod pipeline;
pub mod state;
pub mod supervisor;

pub use pipeline::{BatchDeliveryPipeline, DeliveryStats, FlushReport};
pub use state::{RotationState, SupervisorStatus};
pub use supervisor::{RotationReason, RotationSupervisor, TickOutcome};
