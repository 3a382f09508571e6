//! # Snapshot stores.
//!
//! A [`SnapshotStore`] durably reads and writes one [`TableSnapshot`]
//! covering the entire gate table.
//!
//! ## Contract
//! - `load` returns an **empty table** when no snapshot exists or it cannot
//!   be read; the error is logged, never surfaced. Cleanup repairs whatever
//!   a lost snapshot leaves behind.
//! - `save` is **best-effort**: write failures are logged and swallowed.
//!   Losing durability is preferable to failing an admission decision.
//!
//! The engine calls `load` lazily once per lifetime and re-reads only
//! after [`reset`](crate::AdmissionGate::reset).

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::format::{decode, encode, TableSnapshot};

/// # Durable storage for the gate table snapshot.
///
/// One store instance represents one snapshot location; every load and
/// save goes through the same instance so a single snapshot always covers
/// the whole table.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the snapshot, or an empty table if missing or unreadable.
    async fn load(&self) -> TableSnapshot;

    /// Writes the snapshot, best-effort.
    async fn save(&self, table: &TableSnapshot);
}

/// # JSON snapshot at a filesystem path.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a torn snapshot behind.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store persisting at `path`.
    ///
    /// The parent directory must exist; the file itself is created on the
    /// first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot location.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> TableSnapshot {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet, starting empty");
                return TableSnapshot::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read snapshot, starting empty");
                return TableSnapshot::new();
            }
        };
        match decode(&bytes) {
            Ok(table) => {
                debug!(path = %self.path.display(), jobs = table.len(), "snapshot loaded");
                table
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "snapshot is corrupt, starting empty");
                TableSnapshot::new()
            }
        }
    }

    async fn save(&self, table: &TableSnapshot) {
        let bytes = match encode(table) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to serialize snapshot");
                return;
            }
        };
        let staging = self.staging_path();
        if let Err(err) = tokio::fs::write(&staging, &bytes).await {
            warn!(path = %staging.display(), error = %err, "failed to write snapshot");
            return;
        }
        if let Err(err) = tokio::fs::rename(&staging, &self.path).await {
            warn!(path = %self.path.display(), error = %err, "failed to publish snapshot");
            return;
        }
        debug!(path = %self.path.display(), jobs = table.len(), "snapshot saved");
    }
}

/// # In-memory snapshot store.
///
/// For tests and embedders that do not want durability. `save` keeps the
/// latest snapshot; `load` returns it (or an empty table).
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<TableSnapshot>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with `snapshot`, as if a previous process
    /// had saved it.
    pub fn seeded(snapshot: TableSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// The most recently saved snapshot, if any.
    pub fn saved(&self) -> Option<TableSnapshot> {
        lock(&self.snapshot).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> TableSnapshot {
        lock(&self.snapshot).clone().unwrap_or_default()
    }

    async fn save(&self, table: &TableSnapshot) {
        *lock(&self.snapshot) = Some(table.clone());
    }
}
