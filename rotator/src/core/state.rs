//! Rotation slot bookkeeping
//!
//! Holds the active and candidate workers and enforces the slot invariants:
//! a candidate exists exactly while a transition is in progress, and at most
//! two workers are held at once. No I/O happens here.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::{SupervisorPhase, WorkerTopic};

use crate::traits::Worker;

/// A worker warming up to replace the active one
pub struct Candidate {
    pub worker: Arc<dyn Worker>,
    pub requested_at: Instant,
}

impl Candidate {
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.requested_at)
    }
}

/// Result of promoting a ready candidate
pub struct Promotion {
    /// The previous active worker, still to be terminated by the caller
    pub retired: Option<Arc<dyn Worker>>,
    pub topic: WorkerTopic,
}

/// Point-in-time view of a supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub phase: SupervisorPhase,
    pub active_topic: Option<WorkerTopic>,
    pub candidate_topic: Option<WorkerTopic>,
    pub rotations_completed: u64,
    pub spawn_failures: u64,
}

/// Active/candidate slots of one supervisor
#[derive(Default)]
pub struct RotationState {
    active: Option<Arc<dyn Worker>>,
    candidate: Option<Candidate>,
    active_topic: Option<WorkerTopic>,
    rotations_completed: u64,
    spawn_failures: u64,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SupervisorPhase {
        match (&self.active, &self.candidate) {
            (_, Some(_)) => SupervisorPhase::Transitioning,
            (Some(_), None) => SupervisorPhase::Active,
            (None, None) => SupervisorPhase::Idle,
        }
    }

    /// True between a rotation request and its promotion or abandonment
    pub fn in_transition(&self) -> bool {
        self.candidate.is_some()
    }

    pub fn active(&self) -> Option<&Arc<dyn Worker>> {
        self.active.as_ref()
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    pub fn active_topic(&self) -> Option<&WorkerTopic> {
        self.active_topic.as_ref()
    }

    /// Worker that records should be written to right now
    ///
    /// The active worker whenever there is one, even while a candidate is
    /// warming up. Before the first promotion there is nothing else to
    /// write to, so the first candidate takes records into its input pipe
    /// and reads them once it has initialised.
    pub fn current_process(&self) -> Option<Arc<dyn Worker>> {
        self.active
            .clone()
            .or_else(|| self.candidate.as_ref().map(|candidate| candidate.worker.clone()))
    }

    /// Install a freshly spawned candidate
    ///
    /// Returns the worker back if a transition is already in progress.
    pub fn begin_transition(&mut self, worker: Arc<dyn Worker>, now: Instant) -> Result<(), Arc<dyn Worker>> {
        if self.candidate.is_some() {
            return Err(worker);
        }
        self.candidate = Some(Candidate {
            worker,
            requested_at: now,
        });
        Ok(())
    }

    /// Make the candidate the active worker
    pub fn promote(&mut self) -> Option<Promotion> {
        let candidate = self.candidate.take()?;
        let topic = candidate.worker.topic_name();
        let retired = self.active.replace(candidate.worker);

        self.active_topic = Some(topic.clone());
        self.rotations_completed += 1;

        Some(Promotion { retired, topic })
    }

    /// Drop the candidate without promoting it
    pub fn abandon_candidate(&mut self) -> Option<Arc<dyn Worker>> {
        self.candidate.take().map(|candidate| candidate.worker)
    }

    pub fn record_spawn_failure(&mut self) {
        self.spawn_failures += 1;
    }

    /// Empty both slots, returning every worker still held
    pub fn take_all(&mut self) -> Vec<Arc<dyn Worker>> {
        let mut workers = Vec::with_capacity(2);
        workers.extend(self.active.take());
        workers.extend(self.abandon_candidate());
        workers
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            phase: self.phase(),
            active_topic: self.active_topic.clone(),
            candidate_topic: self.candidate.as_ref().map(|candidate| candidate.worker.topic_name()),
            rotations_completed: self.rotations_completed,
            spawn_failures: self.spawn_failures,
        }
    }
}
