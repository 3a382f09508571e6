//! Error types used by the admission gate.
//!
//! [`GateError`] covers three very different situations, matching how each
//! one reaches its audience:
//!
//! - **Caller errors** (`EmptyStage`, `Reentry`) are returned synchronously
//!   from [`AdmissionGate::enter`](crate::AdmissionGate::enter) and never
//!   mutate persisted state.
//! - **Contention outcomes** (`Superseded`) are not failures of the gate at
//!   all; they are delivered to the losing execution through
//!   [`ExecutionHandle::fail`](crate::ExecutionHandle::fail) so the pipeline
//!   can surface why it was cancelled.
//! - **Lifecycle outcomes** (`Detached`) are produced by
//!   [`Admission`](crate::Admission) when the gate discarded its state while
//!   an execution was still parked.
//!
//! Persistence and stale-handle problems are deliberately *not* represented
//! here: they are logged and swallowed (see the snapshot store contract).

use thiserror::Error;

/// # Errors produced by gate operations.
///
/// Cloneable so the same cause can be both delivered to a losing execution
/// and inspected later by tests or subscribers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// `enter` was called with an empty stage name.
    #[error("stage name must not be empty")]
    EmptyStage,

    /// The same build attempted to re-enter a stage it is already waiting on.
    ///
    /// This is a usage invariant violation by the caller, not a contention
    /// outcome; the gate refuses to proceed rather than corrupt its state.
    #[error("build #{build} is already waiting to enter stage {stage:?} of job {job:?}")]
    Reentry {
        /// Job the stage belongs to.
        job: String,
        /// Stage the build tried to re-enter.
        stage: String,
        /// The offending build number.
        build: u64,
    },

    /// A waiting execution was cancelled because another build won its slot.
    ///
    /// Carries the winning build's identity so operators can audit why the
    /// execution was cancelled.
    #[error("superseded by build #{by_build} in job {job:?}")]
    Superseded {
        /// Job in which the contention happened.
        job: String,
        /// The build that took the waiting slot.
        by_build: u64,
    },

    /// The gate discarded its in-memory state (via
    /// [`reset`](crate::AdmissionGate::reset)) while this execution was
    /// still waiting, so it can no longer be admitted.
    #[error("gate state was discarded while waiting")]
    Detached,
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stagegate::GateError;
    ///
    /// assert_eq!(GateError::EmptyStage.as_label(), "empty_stage");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::EmptyStage => "empty_stage",
            GateError::Reentry { .. } => "stage_reentry",
            GateError::Superseded { .. } => "superseded",
            GateError::Detached => "detached",
        }
    }

    /// True for outcomes delivered to an execution rather than returned to
    /// the caller of `enter`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, GateError::Superseded { .. } | GateError::Detached)
    }
}
