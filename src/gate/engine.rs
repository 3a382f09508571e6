//! # Admission engine.
//!
//! [`AdmissionGate`] owns the gate table and implements the three
//! operations that mutate it: `enter`, `exit`, and `reset`. Every mutation
//! runs under one global lock covering all jobs and stages; `enter` needs a
//! consistent view of a whole job's gates to release the stage a build is
//! advancing out of.
//!
//! ## Control flow
//! ```text
//! enter(job, stage, build, handle, limit)
//!   ├─ load table from store (first use only)
//!   ├─ contention: at most one waiter per gate
//!   │     newer build arrives  → older waiter cancelled (superseded)
//!   │     older build arrives  → incoming cancelled; existing waiter
//!   │                            becomes the contender and is re-evaluated
//!   │     same build arrives   → Err(Reentry), nothing mutated further
//!   ├─ release any other stage of the job the contender was holding
//!   │     (its waiter, if any, is admitted in the same pass)
//!   ├─ park the contender in the waiting slot
//!   ├─ admit immediately if holding < limit (or unbounded)
//!   ├─ cleanup job, persist snapshot
//!   └─ after the lock is released: deliver resume/cancel signals
//! ```
//!
//! `enter` itself never blocks the calling thread waiting for capacity: a
//! parked execution is simply left unresumed, and some later `enter` or
//! `exit` (on another thread) signals its handle.
//!
//! Admission within one stage is deliberately **not FIFO**: the newest
//! non-holding contender always owns the single waiting slot, and older
//! contenders are cancelled rather than queued.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::events::{Bus, EventKind, GateEvent};
use crate::handle::ExecutionHandle;
use crate::registry::BuildRegistry;
use crate::snapshot::{SnapshotStore, TableSnapshot};

use super::builder::GateBuilder;
use super::signal::{self, Signal};
use super::table::{Gate, GateTable, Waiter};

/// # Admission-control gate shared by a process's pipeline executions.
///
/// One instance per snapshot location. The table is loaded from the store
/// lazily on first use and persisted after every mutation; persistence
/// failures degrade to in-memory operation and never fail an admission
/// decision.
///
/// ```no_run
/// use stagegate::{AdmissionGate, JsonFileStore, SuspendedExecution};
///
/// # async fn demo() -> Result<(), stagegate::GateError> {
/// let gate = AdmissionGate::builder()
///     .with_store(JsonFileStore::new("/var/lib/ci/stages.json"))
///     .build();
///
/// let (handle, admission) = SuspendedExecution::new();
/// gate.enter("folder/jobA", "deploy", 42, handle, Some(1)).await?;
/// admission.admitted().await?;
/// // ... inside the deploy stage ...
/// gate.exit("folder/jobA", 42).await;
/// # Ok(())
/// # }
/// ```
pub struct AdmissionGate {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<dyn BuildRegistry>,
    bus: Bus,
    /// `None` until the first operation loads the snapshot; `reset` puts
    /// it back to `None`.
    table: Mutex<Option<GateTable>>,
}

impl AdmissionGate {
    /// Starts building a gate (store, registry, config).
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }

    pub(super) fn from_parts(
        config: &GateConfig,
        store: Arc<dyn SnapshotStore>,
        registry: Arc<dyn BuildRegistry>,
    ) -> Self {
        Self {
            store,
            registry,
            bus: Bus::new(config.bus_capacity_clamped()),
            table: Mutex::new(None),
        }
    }

    /// Subscribes to gate decision events.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.bus.subscribe()
    }

    /// Requests admission of `build` into `stage` of `job`.
    ///
    /// Returns as soon as the decision is recorded; the outcome reaches the
    /// execution through `handle` (resumed when admitted, failed with
    /// [`GateError::Superseded`] when a contender takes its slot). The call
    /// may also signal handles of *other* executions: the waiter it
    /// supersedes, and waiters of stages the build is advancing out of.
    ///
    /// `concurrency` becomes the stage's limit, overwriting whatever
    /// earlier callers declared; `None` means unbounded.
    ///
    /// # Errors
    ///
    /// [`GateError::EmptyStage`] for an empty stage name, and
    /// [`GateError::Reentry`] when `build` is already waiting on this very
    /// stage (a usage invariant violation; the gate is left as it was).
    pub async fn enter(
        &self,
        job: &str,
        stage: &str,
        build: u64,
        handle: Arc<dyn ExecutionHandle>,
        concurrency: Option<u32>,
    ) -> Result<(), GateError> {
        if stage.is_empty() {
            return Err(GateError::EmptyStage);
        }
        debug!(job, stage, build, ?concurrency, "enter");
        handle.trace(&format!("Entering stage {stage}"));

        let mut signals: Vec<Signal> = Vec::new();
        let outcome = {
            let mut slot = self.table.lock().await;
            self.ensure_loaded(&mut slot).await;
            let table = slot.get_or_insert_with(GateTable::default);
            let result =
                self.enter_locked(table, job, stage, build, handle, concurrency, &mut signals);
            if result.is_ok() {
                self.cleanup(table, job).await;
                self.store.save(&table.to_snapshot()).await;
            }
            result
        };
        signal::deliver(signals);
        outcome
    }

    /// Table mutation for `enter`; runs entirely under the table lock.
    #[allow(clippy::too_many_arguments)]
    fn enter_locked(
        &self,
        table: &mut GateTable,
        job: &str,
        stage: &str,
        build: u64,
        handle: Arc<dyn ExecutionHandle>,
        concurrency: Option<u32>,
        signals: &mut Vec<Signal>,
    ) -> Result<(), GateError> {
        let gates = table.jobs.entry(job.to_owned()).or_default();

        let mut contender = Waiter { build, handle };
        {
            let gate = gates.entry(stage.to_owned()).or_insert_with(Gate::new);
            gate.concurrency = concurrency;

            if let Some(waiting) = gate.waiting.take() {
                // Someone has got to give up the single waiting slot.
                match contender.build.cmp(&waiting.build) {
                    Ordering::Greater => {
                        // Newer arrival wins; cancel the older waiter.
                        self.bus.publish(
                            GateEvent::new(EventKind::Superseded, job, stage, waiting.build)
                                .with_by_build(contender.build),
                        );
                        signals.push(supersede(job, waiting, &contender));
                    }
                    Ordering::Less => {
                        // The incoming call loses, but the *older* build is
                        // the rightful contender: cancel the caller and
                        // re-evaluate admission for the existing waiter.
                        self.bus.publish(
                            GateEvent::new(EventKind::Superseded, job, stage, contender.build)
                                .with_by_build(waiting.build),
                        );
                        signals.push(supersede(job, contender, &waiting));
                        contender = waiting;
                    }
                    Ordering::Equal => {
                        gate.waiting = Some(waiting);
                        return Err(GateError::Reentry {
                            job: job.to_owned(),
                            stage: stage.to_owned(),
                            build,
                        });
                    }
                }
            }
        }

        // The contender is advancing out of any other stage of this job it
        // was holding; releasing that slot may admit that stage's waiter.
        let moving = contender.build;
        for (other_stage, other_gate) in gates.iter_mut() {
            if other_stage == stage {
                continue;
            }
            if other_gate.holding.remove(&moving) {
                self.bus
                    .publish(GateEvent::new(EventKind::Released, job, other_stage.as_str(), moving));
                let message =
                    format!("Unblocked since build #{moving} is moving into stage {stage}");
                if let Some((admitted, resume)) = other_gate.admit_waiter(message) {
                    self.bus.publish(GateEvent::new(
                        EventKind::Admitted,
                        job,
                        other_stage.as_str(),
                        admitted,
                    ));
                    signals.push(resume);
                }
            }
        }

        let gate = gates.entry(stage.to_owned()).or_insert_with(Gate::new);
        let contender_handle = contender.handle.clone();
        gate.waiting = Some(contender);
        if gate.has_capacity() {
            if let Some((admitted, resume)) = gate.admit_waiter("Proceeding".to_owned()) {
                self.bus
                    .publish(GateEvent::new(EventKind::Admitted, job, stage, admitted));
                signals.push(resume);
            }
        } else {
            let holding: Vec<u64> = gate.holding.iter().copied().collect();
            self.bus
                .publish(GateEvent::new(EventKind::Parked, job, stage, moving));
            signals.push(Signal::Trace {
                handle: contender_handle,
                message: format!("Waiting for builds {holding:?}"),
            });
        }
        Ok(())
    }

    /// Releases everything `build` holds in `job`.
    ///
    /// Invoked when an execution terminates for any reason (success,
    /// failure, external cancellation), including stages it never
    /// explicitly left. A no-op when the build holds nothing; nothing is
    /// persisted in that case.
    pub async fn exit(&self, job: &str, build: u64) {
        debug!(job, build, "exit");
        let mut signals: Vec<Signal> = Vec::new();
        {
            let mut slot = self.table.lock().await;
            self.ensure_loaded(&mut slot).await;
            let table = slot.get_or_insert_with(GateTable::default);

            let Some(gates) = table.jobs.get_mut(job) else {
                return;
            };
            let mut modified = false;
            for (stage, gate) in gates.iter_mut() {
                if gate.holding.remove(&build) {
                    modified = true;
                    self.bus
                        .publish(GateEvent::new(EventKind::Released, job, stage.as_str(), build));
                    let message = format!("Unblocked since build #{build} finished");
                    if let Some((admitted, resume)) = gate.admit_waiter(message) {
                        self.bus.publish(GateEvent::new(
                            EventKind::Admitted,
                            job,
                            stage.as_str(),
                            admitted,
                        ));
                        signals.push(resume);
                    }
                }
            }
            if modified {
                self.cleanup(table, job).await;
                self.store.save(&table.to_snapshot()).await;
            }
        }
        signal::deliver(signals);
    }

    /// Discards in-memory state; the next operation reloads from the store.
    ///
    /// For test isolation and administrative recovery. Any execution parked
    /// at that moment loses its handle without a signal; a
    /// [`SuspendedExecution`](crate::SuspendedExecution) waiter observes
    /// [`GateError::Detached`].
    pub async fn reset(&self) {
        debug!("reset: discarding in-memory gate table");
        *self.table.lock().await = None;
    }

    /// Read-only view of the current table, loading it if necessary.
    pub async fn snapshot(&self) -> TableSnapshot {
        let mut slot = self.table.lock().await;
        self.ensure_loaded(&mut slot).await;
        slot.get_or_insert_with(GateTable::default).to_snapshot()
    }

    /// Loads the snapshot on first use. Waiting builds found in the
    /// snapshot are dropped as abandoned: their handles did not survive the
    /// restart, so there is nothing left to resume.
    async fn ensure_loaded(&self, slot: &mut Option<GateTable>) {
        if slot.is_some() {
            return;
        }
        let snapshot = self.store.load().await;
        let (table, abandoned) = GateTable::from_snapshot(snapshot);
        for (job, stage, build) in abandoned {
            warn!(
                job = job.as_str(),
                stage = stage.as_str(),
                build,
                "dropping persisted waiter, executions cannot resume across a restart"
            );
            self.bus
                .publish(GateEvent::new(EventKind::WaiterAbandoned, job, stage, build));
        }
        debug!(jobs = table.jobs.len(), "gate table loaded");
        *slot = Some(table);
    }

    /// Prunes `job`'s gates: holders whose build record no longer exists,
    /// then gates with nothing holding and nobody waiting, then the job
    /// entry itself once no gates remain. Never touches a live waiter.
    async fn cleanup(&self, table: &mut GateTable, job: &str) {
        let Some(gates) = table.jobs.get_mut(job) else {
            return;
        };
        for (stage, gate) in gates.iter_mut() {
            let holders: Vec<u64> = gate.holding.iter().copied().collect();
            for number in holders {
                if !self.registry.build_exists(job, number).await {
                    // Deleted at some point without a proper exit.
                    warn!(
                        job,
                        stage = stage.as_str(),
                        build = number,
                        "cleaning up apparently deleted build"
                    );
                    gate.holding.remove(&number);
                    self.bus.publish(GateEvent::new(
                        EventKind::HolderPruned,
                        job,
                        stage.as_str(),
                        number,
                    ));
                }
            }
        }
        gates.retain(|_, gate| !gate.is_empty());
        if gates.is_empty() {
            table.jobs.remove(job);
        }
    }
}

/// Builds the cancellation signal for one contention outcome: `loser` is
/// failed with a cause naming `winner`, and both sides get a trace.
fn supersede(job: &str, loser: Waiter, winner: &Waiter) -> Signal {
    Signal::Supersede {
        loser: loser.handle,
        loser_build: loser.build,
        winner: winner.handle.clone(),
        winner_build: winner.build,
        cause: GateError::Superseded {
            job: job.to_owned(),
            by_build: winner.build,
        },
    }
}
