//! # The gate table: job name, then stage name, then one [`Gate`].
//!
//! Both levels are `BTreeMap`s so iteration and persistence order are
//! deterministic. A gate with nothing holding and nobody waiting is never
//! retained; an empty job entry is removed with it (cleanup enforces both).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use crate::handle::ExecutionHandle;
use crate::snapshot::{GateSnapshot, TableSnapshot};

use super::signal::Signal;

/// The single execution parked at a gate.
pub(crate) struct Waiter {
    /// Build number of the parked execution.
    pub build: u64,
    /// Handle used to resume or cancel it later.
    pub handle: Arc<dyn ExecutionHandle>,
}

/// Runtime state of one stage of one job.
pub(crate) struct Gate {
    /// Builds currently admitted into the stage.
    pub holding: BTreeSet<u64>,
    /// Maximum permitted size of `holding`; `None` means unbounded.
    ///
    /// Always reflects the most recent `enter` for this stage, even when
    /// that differs from what earlier callers declared.
    pub concurrency: Option<u32>,
    /// The execution currently blocked trying to enter, if any.
    ///
    /// Invariant: `holding` never contains the waiter's build.
    pub waiting: Option<Waiter>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            holding: BTreeSet::new(),
            concurrency: None,
            waiting: None,
        }
    }

    /// Whether one more build fits under the current limit.
    pub fn has_capacity(&self) -> bool {
        match self.concurrency {
            None => true,
            Some(limit) => (self.holding.len() as u64) < u64::from(limit),
        }
    }

    /// True when the gate carries no state worth retaining.
    pub fn is_empty(&self) -> bool {
        self.holding.is_empty() && self.waiting.is_none()
    }

    /// Admits the waiting build: moves it into `holding`, clears the slot,
    /// and returns its number plus the resume signal to deliver once the
    /// table lock is released.
    ///
    /// Returns `None` when nobody is waiting.
    pub fn admit_waiter(&mut self, message: String) -> Option<(u64, Signal)> {
        let waiter = self.waiting.take()?;
        if !self.holding.insert(waiter.build) {
            // Can only happen if a build re-entered a stage it already
            // holds; keep going, the set stays consistent.
            warn!(build = waiter.build, "admitted build was already holding this stage");
        }
        Some((
            waiter.build,
            Signal::Resume {
                handle: waiter.handle,
                message,
            },
        ))
    }

    fn to_snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            holding: self.holding.iter().copied().collect(),
            concurrency: self.concurrency,
            waiting_build: self.waiting.as_ref().map(|w| w.build),
        }
    }
}

/// Stage name to gate, for one job.
pub(crate) type StageGates = BTreeMap<String, Gate>;

/// In-memory gate table for every job known to this process.
#[derive(Default)]
pub(crate) struct GateTable {
    pub jobs: BTreeMap<String, StageGates>,
}

impl GateTable {
    /// Serializable view of the whole table. Live handles are not part of
    /// the snapshot; only the waiting build number is recorded.
    pub fn to_snapshot(&self) -> TableSnapshot {
        self.jobs
            .iter()
            .map(|(job, gates)| {
                let stages = gates
                    .iter()
                    .map(|(stage, gate)| (stage.clone(), gate.to_snapshot()))
                    .collect();
                (job.clone(), stages)
            })
            .collect()
    }

    /// Rebuilds the table from a snapshot.
    ///
    /// A persisted `waiting_build` has no handle to resume anymore, so it
    /// is dropped; the returned list names every `(job, stage, build)`
    /// abandoned this way so the caller can log and publish them.
    pub fn from_snapshot(snapshot: TableSnapshot) -> (Self, Vec<(String, String, u64)>) {
        let mut abandoned = Vec::new();
        let mut jobs = BTreeMap::new();
        for (job, stages) in snapshot {
            let mut gates = StageGates::new();
            for (stage, snap) in stages {
                if let Some(build) = snap.waiting_build {
                    abandoned.push((job.clone(), stage.clone(), build));
                }
                let gate = Gate {
                    holding: snap.holding.into_iter().collect(),
                    concurrency: snap.concurrency,
                    waiting: None,
                };
                // An abandoned waiter can leave a gate fully empty; do not
                // resurrect it.
                if !gate.is_empty() {
                    gates.insert(stage, gate);
                }
            }
            if !gates.is_empty() {
                jobs.insert(job, gates);
            }
        }
        (Self { jobs }, abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;

    struct NoopHandle;

    impl ExecutionHandle for NoopHandle {
        fn resume(&self) {}
        fn fail(&self, _cause: GateError) {}
        fn is_live(&self) -> bool {
            true
        }
        fn trace(&self, _message: &str) {}
    }

    fn waiter(build: u64) -> Waiter {
        Waiter {
            build,
            handle: Arc::new(NoopHandle),
        }
    }

    #[test]
    fn capacity_respects_limit_and_unbounded() {
        let mut gate = Gate::new();
        gate.holding.extend([1, 2]);
        assert!(gate.has_capacity());
        gate.concurrency = Some(2);
        assert!(!gate.has_capacity());
        gate.concurrency = Some(3);
        assert!(gate.has_capacity());
    }

    #[test]
    fn admit_waiter_moves_build_into_holding() {
        let mut gate = Gate::new();
        gate.waiting = Some(waiter(5));
        let (build, _signal) = gate.admit_waiter("Proceeding".into()).expect("waiter");
        assert_eq!(build, 5);
        assert!(gate.holding.contains(&5));
        assert!(gate.waiting.is_none());
    }

    #[test]
    fn admit_waiter_without_waiter_is_none() {
        let mut gate = Gate::new();
        assert!(gate.admit_waiter("Proceeding".into()).is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_holding_and_limit() {
        let mut table = GateTable::default();
        let mut gate = Gate::new();
        gate.holding.extend([3, 4]);
        gate.concurrency = Some(2);
        table
            .jobs
            .entry("jobA".into())
            .or_default()
            .insert("build".into(), gate);

        let snapshot = table.to_snapshot();
        let (restored, abandoned) = GateTable::from_snapshot(snapshot.clone());
        assert!(abandoned.is_empty());
        assert_eq!(restored.to_snapshot(), snapshot);
    }

    #[test]
    fn from_snapshot_abandons_persisted_waiters() {
        let mut table = GateTable::default();
        let mut gate = Gate::new();
        gate.holding.insert(1);
        gate.concurrency = Some(1);
        gate.waiting = Some(waiter(2));
        table
            .jobs
            .entry("jobA".into())
            .or_default()
            .insert("build".into(), gate);

        let (restored, abandoned) = GateTable::from_snapshot(table.to_snapshot());
        assert_eq!(abandoned, vec![("jobA".into(), "build".into(), 2)]);
        let gate = &restored.jobs["jobA"]["build"];
        assert!(gate.waiting.is_none());
        assert!(gate.holding.contains(&1));
    }

    #[test]
    fn from_snapshot_drops_gates_emptied_by_abandonment() {
        let mut table = GateTable::default();
        let mut gate = Gate::new();
        gate.waiting = Some(waiter(7));
        table
            .jobs
            .entry("jobA".into())
            .or_default()
            .insert("build".into(), gate);

        let (restored, abandoned) = GateTable::from_snapshot(table.to_snapshot());
        assert_eq!(abandoned.len(), 1);
        assert!(restored.jobs.is_empty());
    }
}
