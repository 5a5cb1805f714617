//! Host-facing rotator
//!
//! Wires one [`RotationSupervisor`] to one [`BatchDeliveryPipeline`] and runs
//! the supervisor's health loop in the background. The host feeds records
//! through [`Rotator::accept`] and gets back what it should emit downstream.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use shared::{logging, process_info, process_warn, ProcessId, RotatorConfig, WorkerTopic};

use crate::core::{BatchDeliveryPipeline, DeliveryStats, RotationSupervisor, SupervisorStatus};
use crate::error::{RotatorError, RotatorResult};
use crate::services::RealWorkerFactory;
use crate::traits::{WorkerFactory, WorkerSource};

/// What the host emits for an accepted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutput {
    /// The record itself, acknowledged unchanged
    Passthrough(String),
    /// Delivery counters after the record was accepted
    Stats(DeliveryStats),
}

impl HostOutput {
    /// Single output line, without terminator
    pub fn render(&self) -> RotatorResult<String> {
        match self {
            HostOutput::Passthrough(record) => Ok(record.clone()),
            HostOutput::Stats(stats) => Ok(serde_json::to_string(stats)?),
        }
    }
}

/// Supervisor plus pipeline, owned by the host
pub struct Rotator<F: WorkerFactory + 'static> {
    supervisor: Arc<RotationSupervisor<F>>,
    pipeline: BatchDeliveryPipeline,
    emit_stats: bool,
    health_task: Option<JoinHandle<()>>,
}

impl Rotator<RealWorkerFactory> {
    /// Build a rotator that spawns real worker processes
    pub async fn from_config(config: RotatorConfig) -> RotatorResult<Self> {
        config.validate()?;
        let factory = RealWorkerFactory::new(config.worker.clone());
        Self::with_factory(factory, &config).await
    }
}

impl<F: WorkerFactory + 'static> Rotator<F> {
    /// Build a rotator around any worker factory
    ///
    /// The first worker is spawned here; the health loop only starts with
    /// [`start`](Self::start).
    pub async fn with_factory(factory: F, config: &RotatorConfig) -> RotatorResult<Self> {
        let supervisor = Arc::new(RotationSupervisor::new(factory, config.supervisor.clone()).await);
        let source: Arc<dyn WorkerSource> = supervisor.clone();
        let pipeline = BatchDeliveryPipeline::new(source, config.pipeline.batch_size)?;

        Ok(Self {
            supervisor,
            pipeline,
            emit_stats: config.pipeline.emit_stats,
            health_task: None,
        })
    }

    /// Start the periodic health check in the background
    pub fn start(&mut self) {
        if self.health_task.is_some() {
            return;
        }

        let supervisor = self.supervisor.clone();
        self.health_task = Some(tokio::spawn(async move {
            supervisor.run().await;
        }));

        logging::log_startup(&ProcessId::Supervisor, "rotation health check");
    }

    /// Hand one record to the pipeline
    pub async fn accept(&self, record: impl Into<String>) -> HostOutput {
        let record = record.into();

        if self.emit_stats {
            HostOutput::Stats(self.pipeline.accept(record).await)
        } else {
            self.pipeline.accept(record.clone()).await;
            HostOutput::Passthrough(record)
        }
    }

    pub fn supervisor(&self) -> &Arc<RotationSupervisor<F>> {
        &self.supervisor
    }

    pub fn pipeline(&self) -> &BatchDeliveryPipeline {
        &self.pipeline
    }

    pub fn active_topic(&self) -> Option<WorkerTopic> {
        self.supervisor.active_topic()
    }

    pub fn subscribe_topic(&self) -> watch::Receiver<Option<WorkerTopic>> {
        self.supervisor.subscribe_topic()
    }

    pub async fn status(&self) -> SupervisorStatus {
        self.supervisor.status().await
    }

    /// Stop the health loop and terminate every worker
    ///
    /// Records still buffered below a full batch are not delivered.
    pub async fn shutdown(mut self) -> RotatorResult<()> {
        let pending = self.pipeline.pending().await;
        if pending > 0 {
            process_warn!(
                ProcessId::Supervisor,
                "⚠️ {} buffered record(s) below batch size {} were not delivered",
                pending,
                self.pipeline.batch_size()
            );
        }

        self.supervisor.shutdown();

        match self.health_task.take() {
            Some(handle) => handle.await.map_err(|e| RotatorError::TaskFailed { message: e.to_string() })?,
            // Never started, so nothing has torn the workers down yet
            None => self.supervisor.teardown().await,
        }

        let stats = self.pipeline.stats().await;
        process_info!(
            ProcessId::Supervisor,
            "📊 Final delivery stats: received={}, piped={}, lag={}",
            stats.received,
            stats.piped,
            stats.lag
        );
        Ok(())
    }
}
