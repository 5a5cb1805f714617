//! Test fixtures and fake workers for rotator tests
//!
//! [`FakeWorker`] records every injected record and lets a test flip its
//! lifecycle flags by hand. [`FakeFactory`] hands out prepared fake workers
//! in order and fails once it runs out.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use rotator::{RotatorError, RotatorResult, Worker, WorkerFactory};
use shared::{RotatorConfig, SupervisorSettings, WorkerConfig, WorkerTopic};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const TENANT: &'static str = "acme";
    pub const FIRST_TOPIC: &'static str = "acme_1_00000001";
    pub const SECOND_TOPIC: &'static str = "acme_2_00000002";
    pub const THIRD_TOPIC: &'static str = "acme_3_00000003";

    /// Settings with a short interval and no readiness timeout
    pub fn settings() -> SupervisorSettings {
        SupervisorSettings {
            health_check_interval_ms: 10,
            ..SupervisorSettings::default()
        }
    }

    pub fn config(batch_size: usize) -> RotatorConfig {
        let mut config = RotatorConfig::new(WorkerConfig::new("fake-worker", Self::TENANT));
        config.supervisor = Self::settings();
        config.pipeline.batch_size = batch_size;
        config
    }

    pub fn records(records: &[&str]) -> Vec<String> {
        records.iter().map(|record| record.to_string()).collect()
    }
}

/// In-memory worker with hand-controlled lifecycle flags
pub struct FakeWorker {
    topic: WorkerTopic,
    spawned: AtomicBool,
    killed: AtomicBool,
    expired: AtomicBool,
    injected: Mutex<Vec<String>>,
    failing_records: Mutex<HashSet<String>>,
    held_record: Mutex<Option<(String, Arc<Notify>)>>,
    hold_reached: Notify,
    terminate_calls: AtomicUsize,
}

impl FakeWorker {
    pub fn new(topic: &str) -> Arc<Self> {
        Arc::new(Self {
            topic: WorkerTopic::from(topic),
            spawned: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            expired: AtomicBool::new(false),
            injected: Mutex::new(Vec::new()),
            failing_records: Mutex::new(HashSet::new()),
            held_record: Mutex::new(None),
            hold_reached: Notify::new(),
            terminate_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_spawned(&self) {
        self.spawned.store(true, Ordering::SeqCst);
    }

    pub fn set_killed(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn set_expired(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    /// Make every injection of `record` fail
    pub fn fail_on(&self, record: &str) {
        self.failing_records.lock().unwrap().insert(record.to_string());
    }

    /// Pause the injection of `record` until the returned handle is notified
    pub fn hold_on(&self, record: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.held_record.lock().unwrap() = Some((record.to_string(), release.clone()));
        release
    }

    /// Wait until an injection is paused by [`hold_on`](Self::hold_on)
    pub async fn wait_for_hold(&self) {
        self.hold_reached.notified().await;
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }

    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for FakeWorker {
    fn topic_name(&self) -> WorkerTopic {
        self.topic.clone()
    }

    fn is_spawned(&self) -> bool {
        self.spawned.load(Ordering::SeqCst)
    }

    fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    async fn inject(&self, data: &str) -> RotatorResult<()> {
        let release = {
            let held = self.held_record.lock().unwrap();
            held.as_ref()
                .filter(|(record, _)| record == data)
                .map(|(_, release)| release.clone())
        };
        if let Some(release) = release {
            self.hold_reached.notify_one();
            release.notified().await;
        }

        if self.is_killed() || self.failing_records.lock().unwrap().contains(data) {
            return Err(RotatorError::ProcessKilled {
                topic: self.topic.clone(),
            });
        }
        self.injected.lock().unwrap().push(data.to_string());
        Ok(())
    }

    async fn terminate(&self) {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        self.killed.store(true, Ordering::SeqCst);
    }
}

/// Factory handing out prepared fake workers in order
#[derive(Clone, Default)]
pub struct FakeFactory {
    prepared: Arc<Mutex<VecDeque<Arc<FakeWorker>>>>,
    spawn_calls: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn with_workers(workers: &[Arc<FakeWorker>]) -> Self {
        let factory = Self::default();
        for worker in workers {
            factory.prepare(worker.clone());
        }
        factory
    }

    /// Queue a worker for the next spawn
    pub fn prepare(&self, worker: Arc<FakeWorker>) {
        self.prepared.lock().unwrap().push_back(worker);
    }

    pub fn spawn_calls(&self) -> usize {
        self.spawn_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerFactory for FakeFactory {
    async fn spawn_worker(&self) -> RotatorResult<Arc<dyn Worker>> {
        self.spawn_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.prepared.lock().unwrap().pop_front();

        match next {
            Some(worker) => Ok(worker),
            None => Err(RotatorError::SpawnFailed {
                command: "fake-worker".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no prepared worker"),
            }),
        }
    }
}
