//! Rotation supervisor
//!
//! Drives the worker lifecycle:
//!
//! ```text
//! Idle ──spawn──► Transitioning ──candidate ready──► Active
//!                      ▲                                │
//!                      └──────── active expired ────────┘
//! ```
//!
//! A periodic health check (`tick`) is the only thing that moves the state
//! machine. Record delivery only reads the current worker, so a slow or
//! stuck spawn never blocks ingestion; it only delays retiring the old
//! worker.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use shared::{
    process_debug, process_error, process_info, process_warn, ProcessId, SupervisorPhase, SupervisorSettings,
    WorkerTopic,
};

use super::state::{RotationState, SupervisorStatus};
use crate::traits::{DeliveryLease, Worker, WorkerFactory, WorkerSource};

/// Why a new candidate was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// First worker at construction
    Initial,
    /// Active worker outlived its lifetime budget
    Expired,
    /// Active worker exited on its own
    ActiveExited,
    /// Nothing is running, typically after a failed spawn
    Retry,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationReason::Initial => write!(f, "initial worker"),
            RotationReason::Expired => write!(f, "active worker expired"),
            RotationReason::ActiveExited => write!(f, "active worker exited"),
            RotationReason::Retry => write!(f, "no worker running"),
        }
    }
}

/// What a single health check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do
    Steady,
    /// A candidate is still warming up
    AwaitingReadiness { topic: WorkerTopic },
    /// The candidate became the active worker
    Promoted { topic: WorkerTopic },
    /// A new candidate was spawned
    RotationStarted { topic: WorkerTopic, reason: RotationReason },
    /// Spawning a candidate failed; retried on the next tick
    SpawnFailed { reason: RotationReason },
    /// The candidate died or timed out before becoming ready
    CandidateAbandoned { topic: WorkerTopic },
    /// The supervisor has been torn down
    Stopped,
}

/// Owns the active and candidate workers of one input stream
pub struct RotationSupervisor<F: WorkerFactory> {
    state: Mutex<RotationState>,
    /// Read side held by every in-flight batch, write side by retirement
    delivery_gate: Arc<RwLock<()>>,
    factory: F,
    settings: SupervisorSettings,
    topic_tx: watch::Sender<Option<WorkerTopic>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<F: WorkerFactory> RotationSupervisor<F> {
    /// Create a supervisor and immediately spawn its first candidate
    ///
    /// A failed first spawn is logged and retried on the next tick.
    pub async fn new(factory: F, settings: SupervisorSettings) -> Self {
        let (topic_tx, _) = watch::channel(None);
        let (shutdown_tx, _) = watch::channel(false);

        let supervisor = Self {
            state: Mutex::new(RotationState::new()),
            delivery_gate: Arc::new(RwLock::new(())),
            factory,
            settings,
            topic_tx,
            shutdown_tx,
        };

        {
            let mut state = supervisor.state.lock().await;
            supervisor.start_rotation(&mut state, RotationReason::Initial).await;
        }

        supervisor
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Topic of the active worker, once one has been promoted
    pub fn active_topic(&self) -> Option<WorkerTopic> {
        self.topic_tx.borrow().clone()
    }

    /// Subscribe to active topic changes; the value changes once per completed rotation
    pub fn subscribe_topic(&self) -> watch::Receiver<Option<WorkerTopic>> {
        self.topic_tx.subscribe()
    }

    pub async fn phase(&self) -> SupervisorPhase {
        self.state.lock().await.phase()
    }

    pub async fn in_transition(&self) -> bool {
        self.state.lock().await.in_transition()
    }

    pub async fn status(&self) -> SupervisorStatus {
        self.state.lock().await.status()
    }

    /// Run one health check
    ///
    /// A retired worker is terminated only after every batch checked out
    /// against it has been delivered.
    pub async fn tick(&self) -> TickOutcome {
        if *self.shutdown_tx.borrow() {
            return TickOutcome::Stopped;
        }

        let mut retired: Option<Arc<dyn Worker>> = None;

        let outcome = {
            let mut state = self.state.lock().await;

            if let Some(candidate) = state.candidate() {
                let worker = candidate.worker.clone();
                let waited = candidate.waited(Instant::now());
                let topic = worker.topic_name();
                let process_id = ProcessId::worker(&topic);

                if worker.is_spawned() {
                    match state.promote() {
                        Some(promotion) => {
                            retired = promotion.retired;
                            self.topic_tx.send_replace(Some(promotion.topic.clone()));
                            process_info!(process_id, "🔄 Promoted to active after {:?}", waited);
                            TickOutcome::Promoted { topic: promotion.topic }
                        }
                        None => TickOutcome::Steady,
                    }
                } else if worker.is_killed() {
                    process_warn!(process_id, "💀 Candidate exited before signalling readiness");
                    retired = state.abandon_candidate();
                    TickOutcome::CandidateAbandoned { topic }
                } else if self.settings.readiness_timeout().is_some_and(|limit| waited > limit) {
                    process_warn!(process_id, "⏱️ Candidate not ready after {:?}, abandoning it", waited);
                    retired = state.abandon_candidate();
                    TickOutcome::CandidateAbandoned { topic }
                } else {
                    process_debug!(process_id, "Waiting for readiness ({:?} so far)", waited);
                    TickOutcome::AwaitingReadiness { topic }
                }
            } else {
                let reason = match state.active() {
                    None => Some(RotationReason::Retry),
                    Some(active) if self.settings.replace_dead_active && active.is_killed() => {
                        Some(RotationReason::ActiveExited)
                    }
                    Some(active) if active.is_expired() => Some(RotationReason::Expired),
                    Some(_) => None,
                };

                match reason {
                    Some(reason) => self.start_rotation(&mut state, reason).await,
                    None => TickOutcome::Steady,
                }
            }
        };

        // Terminating an empty slot is a no-op
        if let Some(worker) = retired {
            let _gate = self.delivery_gate.write().await;
            worker.terminate().await;
        }

        outcome
    }

    /// Spawn a candidate into the (empty) candidate slot
    async fn start_rotation(&self, state: &mut RotationState, reason: RotationReason) -> TickOutcome {
        match self.factory.spawn_worker().await {
            Ok(worker) => {
                let topic = worker.topic_name();
                match state.begin_transition(worker, Instant::now()) {
                    Ok(()) => {
                        process_info!(ProcessId::Supervisor, "🚀 Rotation started ({}): candidate {}", reason, topic);
                        TickOutcome::RotationStarted { topic, reason }
                    }
                    Err(worker) => {
                        process_error!(ProcessId::Supervisor, "Rotation already in progress, discarding {}", topic);
                        worker.terminate().await;
                        TickOutcome::Steady
                    }
                }
            }
            Err(e) => {
                state.record_spawn_failure();
                process_error!(ProcessId::Supervisor, "❌ Failed to spawn worker ({}): {}", reason, e);
                TickOutcome::SpawnFailed { reason }
            }
        }
    }

    /// Run health checks at the configured interval until [`shutdown`](Self::shutdown)
    ///
    /// Tears down all workers before returning.
    pub async fn run(&self) {
        let mut health_interval = interval(self.settings.health_check_interval());
        health_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = health_interval.tick() => {
                    self.tick().await;
                },
                _ = shutdown_rx.changed() => {}
            }
        }

        self.teardown().await;
    }

    /// Stop the health check loop
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Terminate every worker this supervisor holds
    pub async fn teardown(&self) {
        let workers = self.state.lock().await.take_all();
        let count = workers.len();
        let _gate = self.delivery_gate.write().await;

        for worker in workers {
            worker.terminate().await;
        }

        process_info!(ProcessId::Supervisor, "🛑 Supervisor torn down, {} worker(s) terminated", count);
    }
}

#[async_trait]
impl<F: WorkerFactory> WorkerSource for RotationSupervisor<F> {
    async fn current_process(&self) -> Option<Arc<dyn Worker>> {
        self.state.lock().await.current_process()
    }

    async fn checkout(&self) -> Option<DeliveryLease> {
        // Gate before state: tick releases the state lock before waiting on the gate
        let gate = self.delivery_gate.clone().read_owned().await;
        let worker = self.state.lock().await.current_process()?;
        Some(DeliveryLease::new(worker, gate))
    }
}
