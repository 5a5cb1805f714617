//! Trait definitions with mockall annotations for testing
//!
//! The supervisor and the pipeline only see workers through these traits, so
//! the rotation state machine can be exercised without real OS processes.

use std::sync::Arc;
use tokio::sync::OwnedRwLockReadGuard;

use shared::WorkerTopic;

use crate::error::RotatorResult;

/// A single supervised worker process
#[mockall::automock]
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    /// Topic the worker was told to publish under
    fn topic_name(&self) -> WorkerTopic;

    /// Whether the worker has signalled readiness
    fn is_spawned(&self) -> bool;

    /// Whether the worker has exited, for whatever reason
    fn is_killed(&self) -> bool;

    /// Whether the worker has outlived its lifetime budget
    fn is_expired(&self) -> bool;

    /// Write one record, followed by a record terminator, to the worker's input
    async fn inject(&self, data: &str) -> RotatorResult<()>;

    /// Close the worker's input and ask it to exit. Idempotent.
    async fn terminate(&self);
}

/// Creates fresh workers for the supervisor
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkerFactory: Send + Sync {
    /// Start a new worker process
    ///
    /// # Returns
    /// The running worker (not necessarily ready yet), or the spawn failure
    async fn spawn_worker(&self) -> RotatorResult<Arc<dyn Worker>>;
}

/// A worker checked out for the delivery of one batch
///
/// The supervisor does not terminate a worker while a lease on it is alive.
pub struct DeliveryLease {
    worker: Arc<dyn Worker>,
    _gate: Option<OwnedRwLockReadGuard<()>>,
}

impl DeliveryLease {
    pub fn new(worker: Arc<dyn Worker>, gate: OwnedRwLockReadGuard<()>) -> Self {
        Self {
            worker,
            _gate: Some(gate),
        }
    }

    /// Lease that holds nothing back, for sources that never retire workers
    pub fn unguarded(worker: Arc<dyn Worker>) -> Self {
        Self { worker, _gate: None }
    }

    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }
}

/// Resolves the worker that records should be delivered to right now
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkerSource: Send + Sync {
    async fn current_process(&self) -> Option<Arc<dyn Worker>>;

    /// Resolve the current worker and keep it alive until the lease is dropped
    async fn checkout(&self) -> Option<DeliveryLease>;
}
