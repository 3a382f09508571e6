//! Snapshot durability, restart recovery, and degraded persistence.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CountingStore, RecordingHandle};
use stagegate::{
    AdmissionGate, EventKind, GateSnapshot, JsonFileStore, MemoryStore, SnapshotStore,
    TableSnapshot,
};

fn seeded_snapshot(waiting_build: Option<u64>) -> TableSnapshot {
    let mut stages = BTreeMap::new();
    stages.insert(
        "build".to_string(),
        GateSnapshot {
            holding: vec![1],
            concurrency: Some(1),
            waiting_build,
        },
    );
    let mut jobs = TableSnapshot::new();
    jobs.insert("jobA".to_string(), stages);
    jobs
}

#[tokio::test]
async fn state_is_shared_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let gate = AdmissionGate::builder().with_shared_store(store.clone()).build();

    let h1 = RecordingHandle::new();
    gate.enter("jobA", "build", 1, h1, Some(1)).await.expect("enter");

    // A second engine over the same store sees the persisted table.
    let restarted = AdmissionGate::builder().with_shared_store(store).build();
    let snap = restarted.snapshot().await;
    assert_eq!(snap["jobA"]["build"].holding, vec![1]);
    assert_eq!(snap["jobA"]["build"].concurrency, Some(1));
}

#[tokio::test]
async fn persisted_waiter_is_abandoned_on_load() {
    let store = Arc::new(MemoryStore::seeded(seeded_snapshot(Some(2))));
    let gate = AdmissionGate::builder().with_shared_store(store).build();
    let mut events = gate.subscribe();

    let snap = gate.snapshot().await;
    assert_eq!(snap["jobA"]["build"].holding, vec![1]);
    assert_eq!(snap["jobA"]["build"].waiting_build, None, "no handle survives a restart");

    let ev = events.try_recv().expect("abandonment event");
    assert_eq!(ev.kind, EventKind::WaiterAbandoned);
    assert_eq!(ev.build, 2);
}

#[tokio::test]
async fn reset_forces_reload_and_detaches_nothing_persisted() {
    let store = Arc::new(MemoryStore::new());
    let gate = AdmissionGate::builder().with_shared_store(store).build();

    let h1 = RecordingHandle::new();
    gate.enter("jobA", "build", 1, h1, Some(1)).await.expect("enter 1");
    let h2 = RecordingHandle::new();
    gate.enter("jobA", "build", 2, h2.clone(), Some(1)).await.expect("enter 2");

    gate.reset().await;

    // Reload sees build 1 holding; the parked build 2 was persisted only
    // as a number and is dropped as abandoned.
    let snap = gate.snapshot().await;
    assert_eq!(snap["jobA"]["build"].holding, vec![1]);
    assert_eq!(snap["jobA"]["build"].waiting_build, None);
    assert!(!h2.resumed());
}

#[tokio::test]
async fn file_store_round_trips_across_engines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stages.json");

    let gate = AdmissionGate::builder().with_store(JsonFileStore::new(&path)).build();
    let h1 = RecordingHandle::new();
    gate.enter("folder/jobA", "deploy", 7, h1, Some(2)).await.expect("enter");

    let text = std::fs::read_to_string(&path).expect("snapshot written");
    assert!(text.contains("\"version\": 1"));
    assert!(text.contains("folder/jobA"));

    let restarted = AdmissionGate::builder().with_store(JsonFileStore::new(&path)).build();
    let snap = restarted.snapshot().await;
    assert_eq!(snap["folder/jobA"]["deploy"].holding, vec![7]);
}

#[tokio::test]
async fn legacy_snapshot_is_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stages.json");
    std::fs::write(
        &path,
        br#"{"jobA": {"build": {"holding": [4, 5], "concurrency": 2}}}"#,
    )
    .expect("write legacy");

    let gate = AdmissionGate::builder().with_store(JsonFileStore::new(&path)).build();
    let snap = gate.snapshot().await;
    assert_eq!(snap["jobA"]["build"].holding, vec![4, 5]);
    assert_eq!(snap["jobA"]["build"].concurrency, Some(2));
}

/// Store whose writes always fail; loads succeed.
struct BrokenWrites;

#[async_trait]
impl SnapshotStore for BrokenWrites {
    async fn load(&self) -> TableSnapshot {
        TableSnapshot::new()
    }

    async fn save(&self, _table: &TableSnapshot) {
        // Swallowed, like a full disk would be after logging.
    }
}

#[tokio::test]
async fn save_failures_never_block_admission() {
    let gate = AdmissionGate::builder().with_store(BrokenWrites).build();
    let handle = RecordingHandle::new();
    gate.enter("jobA", "build", 1, handle.clone(), Some(1))
        .await
        .expect("admission must not depend on durability");
    assert!(handle.resumed());
}

#[tokio::test]
async fn every_mutation_persists_exactly_once() {
    let store = CountingStore::new();
    let gate = AdmissionGate::builder().with_shared_store(store.clone()).build();

    let h1 = RecordingHandle::new();
    gate.enter("jobA", "build", 1, h1, Some(1)).await.expect("enter 1");
    assert_eq!(store.saves(), 1);

    let h2 = RecordingHandle::new();
    gate.enter("jobA", "build", 2, h2, Some(1)).await.expect("enter 2");
    assert_eq!(store.saves(), 2);

    gate.exit("jobA", 1).await;
    assert_eq!(store.saves(), 3);

    // Nothing held by build 2's exit target once it finished and left.
    gate.exit("jobA", 99).await;
    assert_eq!(store.saves(), 3);
}

#[tokio::test]
async fn snapshot_save_load_round_trip_preserves_the_table() {
    let store = Arc::new(MemoryStore::new());
    let gate = AdmissionGate::builder().with_shared_store(store.clone()).build();

    let h1 = RecordingHandle::new();
    gate.enter("jobA", "stage-one", 1, h1, Some(2)).await.expect("enter");
    let h2 = RecordingHandle::new();
    gate.enter("jobB", "deploy", 3, h2, None).await.expect("enter");

    let live = gate.snapshot().await;
    assert_eq!(store.saved().as_ref(), Some(&live));
    assert_eq!(store.load().await, live);
}
