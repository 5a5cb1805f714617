//! Worker factory spawning real OS processes

use async_trait::async_trait;
use std::sync::Arc;

use shared::WorkerConfig;

use super::managed_process::ManagedProcess;
use crate::error::RotatorResult;
use crate::traits::{Worker, WorkerFactory};

/// Spawns a [`ManagedProcess`] per rotation
pub struct RealWorkerFactory {
    config: WorkerConfig,
}

impl RealWorkerFactory {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

#[async_trait]
impl WorkerFactory for RealWorkerFactory {
    async fn spawn_worker(&self) -> RotatorResult<Arc<dyn Worker>> {
        let process = ManagedProcess::spawn(&self.config)?;
        Ok(Arc::new(process))
    }
}
