//! Persistence: one durable snapshot of the full gate table.

mod format;
mod store;

pub use format::{GateSnapshot, TableSnapshot, SNAPSHOT_VERSION};
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};
