//! Shared helpers for integration tests.
#![allow(dead_code)] // each test binary uses its own subset

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stagegate::{BuildRegistry, ExecutionHandle, GateError, MemoryStore, SnapshotStore, TableSnapshot};

/// Handle that records every signal it receives.
pub struct RecordingHandle {
    live: AtomicBool,
    resumed: AtomicBool,
    failure: Mutex<Option<GateError>>,
    messages: Mutex<Vec<String>>,
}

impl RecordingHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            live: AtomicBool::new(true),
            resumed: AtomicBool::new(false),
            failure: Mutex::new(None),
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }

    pub fn failure(&self) -> Option<GateError> {
        self.failure.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ExecutionHandle for RecordingHandle {
    fn resume(&self) {
        self.resumed.store(true, Ordering::SeqCst);
    }

    fn fail(&self, cause: GateError) {
        *self.failure.lock().unwrap() = Some(cause);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn trace(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Registry backed by an explicit set of existing builds.
pub struct StaticBuilds {
    builds: Mutex<HashSet<(String, u64)>>,
}

impl StaticBuilds {
    pub fn with(builds: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            builds: Mutex::new(
                builds
                    .iter()
                    .map(|(job, build)| (job.to_string(), *build))
                    .collect(),
            ),
        })
    }

    pub fn delete(&self, job: &str, build: u64) {
        self.builds.lock().unwrap().remove(&(job.to_string(), build));
    }
}

#[async_trait]
impl BuildRegistry for StaticBuilds {
    async fn build_exists(&self, job: &str, build: u64) -> bool {
        self.builds.lock().unwrap().contains(&(job.to_string(), build))
    }
}

/// Store wrapper counting how many times `save` ran.
pub struct CountingStore {
    inner: MemoryStore,
    saves: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            saves: AtomicUsize::new(0),
        })
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for CountingStore {
    async fn load(&self) -> TableSnapshot {
        self.inner.load().await
    }

    async fn save(&self, table: &TableSnapshot) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(table).await;
    }
}
