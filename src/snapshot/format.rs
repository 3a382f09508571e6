//! # On-disk snapshot format.
//!
//! The whole gate table persists as one JSON document. Keys are `BTreeMap`
//! ordered and the holding list is sorted, so consecutive snapshots of the
//! same state are byte-identical and diff-friendly.
//!
//! ## Current layout (version 1)
//! ```json
//! {
//!   "version": 1,
//!   "jobs": {
//!     "folder/jobA": {
//!       "build": { "holding": [3, 4], "concurrency": 2, "waiting_build": 5 }
//!     }
//!   }
//! }
//! ```
//!
//! ## Legacy layout
//! Earlier releases wrote the bare job map with no envelope and no
//! `waiting_build` field. [`decode`] accepts both shapes; the versioned
//! envelope is the only shape ever written.
//!
//! The waiting *handle* is never persisted: it is a live, in-process
//! reference and cannot survive a restart. Only `waiting_build` is kept,
//! and the engine decides what to do with it on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version written in the snapshot envelope.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized state of the full gate table: job name, then stage name.
pub type TableSnapshot = BTreeMap<String, BTreeMap<String, GateSnapshot>>;

/// Serialized state of one gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    /// Builds admitted into the stage, sorted ascending.
    pub holding: Vec<u64>,

    /// Concurrency limit declared by the most recent `enter`; absent means
    /// unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,

    /// Build parked in the waiting slot when the snapshot was taken, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_build: Option<u64>,
}

/// Envelope written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    jobs: TableSnapshot,
}

/// Either the current envelope or the bare legacy job map.
#[derive(Deserialize)]
#[serde(untagged)]
enum OnDisk {
    Versioned(Envelope),
    Legacy(TableSnapshot),
}

/// Serializes a snapshot into the versioned envelope.
pub(crate) fn encode(table: &TableSnapshot) -> Result<Vec<u8>, serde_json::Error> {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        jobs: table.clone(),
    };
    serde_json::to_vec_pretty(&envelope)
}

/// Deserializes either snapshot shape into the current model.
pub(crate) fn decode(bytes: &[u8]) -> Result<TableSnapshot, serde_json::Error> {
    match serde_json::from_slice::<OnDisk>(bytes)? {
        OnDisk::Versioned(envelope) => Ok(envelope.jobs),
        OnDisk::Legacy(jobs) => Ok(jobs),
    }
}
