//! # stagegate
//!
//! **stagegate** is an admission-control gate for pipeline executions.
//!
//! Independently-running executions of the same job coordinate access to
//! named checkpoints ("stages"). Each stage behaves like a bounded
//! semaphore with one distinctive policy: at most one execution may be
//! *waiting* to enter a stage at any time, and when a newer build arrives
//! while an older one is waiting, the newer one wins and the older waiter
//! is cancelled. Gate state survives process restarts through a snapshot
//! store and self-heals when build records it references disappear.
//!
//! ## Architecture
//! ```text
//!   execution A          execution B          execution C
//!  (build #41)          (build #42)          (build #43)
//!       │ enter/exit         │                    │
//!       ▼                    ▼                    ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  AdmissionGate (one global critical section)              │
//! │  - GateTable: job ─► stage ─► Gate                        │
//! │      Gate = { holding, concurrency, waiting }             │
//! │  - contention: newest contender owns the waiting slot     │
//! │  - cleanup: prunes holders whose build no longer exists   │
//! └───────┬───────────────────────┬───────────────────┬───────┘
//!         │ deferred signals      │ snapshot          │ events
//!         ▼                       ▼                   ▼
//!   ExecutionHandle         SnapshotStore           Bus
//!   resume / fail / trace   (JSON file, memory)     (broadcast)
//! ```
//!
//! `enter` records its decision and returns; the waiting execution is
//! resumed later, from inside some *other* execution's `enter` or `exit`.
//! Handle signaling always happens after the critical section is released,
//! so resuming an execution can synchronously trigger another gate
//! operation without deadlocking.
//!
//! ## Features
//! | Area            | Description                                                | Key types                                  |
//! |-----------------|------------------------------------------------------------|--------------------------------------------|
//! | **Admission**   | `enter`/`exit`/`reset`, supersede-on-contention.           | [`AdmissionGate`], [`GateBuilder`]         |
//! | **Handles**     | Signalable references to suspended executions.             | [`ExecutionHandle`], [`SuspendedExecution`]|
//! | **Persistence** | One durable JSON snapshot of the whole table.              | [`SnapshotStore`], [`JsonFileStore`]       |
//! | **Cleanup**     | Prunes state of builds deleted out-of-band.                | [`BuildRegistry`]                          |
//! | **Events**      | Auditable decision stream for subscribers.                 | [`GateEvent`], [`EventKind`], [`Bus`]      |
//! | **Errors**      | Typed causes for callers and cancelled executions.         | [`GateError`]                              |
//!
//! ## Example
//! ```rust
//! use stagegate::{AdmissionGate, SuspendedExecution};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), stagegate::GateError> {
//!     let gate = AdmissionGate::builder().build();
//!
//!     // Build 1 enters the "deploy" stage, limit 1: admitted at once.
//!     let (h1, a1) = SuspendedExecution::new();
//!     gate.enter("jobA", "deploy", 1, h1, Some(1)).await?;
//!     a1.admitted().await?;
//!
//!     // Build 2 arrives while 1 holds the stage: parked in the waiting
//!     // slot until build 1 exits.
//!     let (h2, a2) = SuspendedExecution::new();
//!     gate.enter("jobA", "deploy", 2, h2, Some(1)).await?;
//!
//!     gate.exit("jobA", 1).await; // admits build 2
//!     a2.admitted().await?;
//!     gate.exit("jobA", 2).await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod gate;
mod handle;
mod registry;
mod snapshot;

// ---- Public re-exports ----

pub use config::GateConfig;
pub use error::GateError;
pub use events::{Bus, EventKind, GateEvent};
pub use gate::{AdmissionGate, GateBuilder};
pub use handle::{Admission, ExecutionHandle, SuspendedExecution};
pub use registry::{AssumeLive, BuildRegistry};
pub use snapshot::{
    GateSnapshot, JsonFileStore, MemoryStore, SnapshotStore, TableSnapshot, SNAPSHOT_VERSION,
};
