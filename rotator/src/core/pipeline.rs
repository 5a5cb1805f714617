//! Batched record delivery
//!
//! Records are buffered in arrival order and written to the current worker
//! in fixed-size batches. The buffer lock is held while a batch is flushed,
//! so batches reach the worker in the order they were accepted.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use shared::{process_debug, process_warn, ProcessId};

use crate::error::{RotatorError, RotatorResult};
use crate::traits::WorkerSource;

/// Delivery counters reported after every accepted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Records accepted so far
    pub received: u64,
    /// Records handed to a worker in completed batches
    pub piped: u64,
    /// Records accepted but not yet flushed
    pub lag: u64,
}

impl DeliveryStats {
    fn new(received: u64, flushed_batches: u64, batch_size: usize) -> Self {
        let piped = flushed_batches * batch_size as u64;
        Self {
            received,
            piped,
            lag: received.saturating_sub(piped),
        }
    }
}

/// Per-batch injection result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct PipelineState {
    buffer: Vec<String>,
    received_count: u64,
    flushed_batch_count: u64,
    injection_failures: u64,
}

/// Buffers records and flushes full batches to the current worker
pub struct BatchDeliveryPipeline {
    source: Arc<dyn WorkerSource>,
    batch_size: usize,
    state: Mutex<PipelineState>,
}

impl BatchDeliveryPipeline {
    pub fn new(source: Arc<dyn WorkerSource>, batch_size: usize) -> RotatorResult<Self> {
        if batch_size == 0 {
            return Err(RotatorError::config("pipeline.batch_size must be positive"));
        }

        Ok(Self {
            source,
            batch_size,
            state: Mutex::new(PipelineState {
                buffer: Vec::with_capacity(batch_size),
                ..PipelineState::default()
            }),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Buffer one record, flushing when the batch is full
    pub async fn accept(&self, record: impl Into<String>) -> DeliveryStats {
        let mut state = self.state.lock().await;
        state.buffer.push(record.into());
        state.received_count += 1;

        if state.buffer.len() >= self.batch_size {
            let batch = std::mem::replace(&mut state.buffer, Vec::with_capacity(self.batch_size));
            state.flushed_batch_count += 1;

            let report = self.flush(&batch).await;
            state.injection_failures += report.failed as u64;
        }

        DeliveryStats::new(state.received_count, state.flushed_batch_count, self.batch_size)
    }

    /// Inject every record of `batch`, in order, into one resolved worker
    ///
    /// The worker stays checked out until the whole batch has been written,
    /// so a rotation cannot retire it halfway through. A failed record is
    /// logged and skipped; it is not retried.
    pub async fn flush(&self, batch: &[String]) -> FlushReport {
        let Some(lease) = self.source.checkout().await else {
            process_warn!(
                ProcessId::Supervisor,
                "⚠️ No worker available, dropping batch of {} record(s)",
                batch.len()
            );
            return FlushReport {
                delivered: 0,
                failed: batch.len(),
            };
        };

        let worker = lease.worker();
        let process_id = ProcessId::worker(&worker.topic_name());
        let mut report = FlushReport::default();

        for (index, record) in batch.iter().enumerate() {
            match worker.inject(record).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    process_warn!(process_id, "⚠️ Dropped record {} of batch: {}", index, e);
                }
            }
        }

        process_debug!(
            process_id,
            "📦 Flushed batch: {} delivered, {} failed",
            report.delivered,
            report.failed
        );
        report
    }

    pub async fn stats(&self) -> DeliveryStats {
        let state = self.state.lock().await;
        DeliveryStats::new(state.received_count, state.flushed_batch_count, self.batch_size)
    }

    /// Records waiting for their batch to fill up
    pub async fn pending(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    pub async fn flushed_batch_count(&self) -> u64 {
        self.state.lock().await.flushed_batch_count
    }

    pub async fn injection_failures(&self) -> u64 {
        self.state.lock().await.injection_failures
    }
}
