//! # Gate decision events.
//!
//! Every observable admission decision is published as a [`GateEvent`] so
//! embedders can audit gate behavior (dashboards, build annotations, test
//! assertions) without scraping logs.
//!
//! ## Ordering guarantees
//! Each event carries a globally unique sequence number (`seq`) that
//! increases monotonically. Use `seq` to restore the exact decision order
//! when events are observed out of order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of gate events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A build was admitted into a stage (moved into `holding`).
    ///
    /// Sets: `job`, `stage`, `build`.
    Admitted,

    /// A build was parked in a stage's waiting slot (capacity reached).
    ///
    /// Sets: `job`, `stage`, `build`.
    Parked,

    /// A waiting build lost its slot to another build and was cancelled.
    ///
    /// Sets: `job`, `stage`, `build` (the loser), `by_build` (the winner).
    Superseded,

    /// A build released its holding slot in a stage.
    ///
    /// Emitted both for explicit `exit` and for the cross-stage release
    /// that happens when a build advances into another stage.
    ///
    /// Sets: `job`, `stage`, `build`.
    Released,

    /// Cleanup pruned a holding build whose record no longer exists.
    ///
    /// Sets: `job`, `stage`, `build`.
    HolderPruned,

    /// A persisted waiting build was dropped while loading a snapshot.
    ///
    /// A waiting handle cannot survive a process restart, so the build is
    /// treated as abandoned.
    ///
    /// Sets: `job`, `stage`, `build`.
    WaiterAbandoned,
}

/// One gate decision with its subjects.
///
/// `seq` is a monotonic global sequence for ordering; `at` is the
/// wall-clock timestamp for logs. Optional fields are set depending on the
/// [`EventKind`].
#[derive(Debug, Clone)]
pub struct GateEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Job the decision belongs to.
    pub job: Arc<str>,
    /// Stage the decision belongs to.
    pub stage: Arc<str>,
    /// Build number the decision is about.
    pub build: u64,
    /// The superseding build, for [`EventKind::Superseded`].
    pub by_build: Option<u64>,
}

impl GateEvent {
    /// Creates a new event with current timestamp and next sequence number.
    pub fn new(kind: EventKind, job: impl Into<Arc<str>>, stage: impl Into<Arc<str>>, build: u64) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: job.into(),
            stage: stage.into(),
            build,
            by_build: None,
        }
    }

    /// Attaches the superseding build number.
    #[inline]
    pub fn with_by_build(mut self, by_build: u64) -> Self {
        self.by_build = Some(by_build);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = GateEvent::new(EventKind::Admitted, "jobA", "build", 1);
        let b = GateEvent::new(EventKind::Released, "jobA", "build", 1);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn by_build_marks_the_winner() {
        let ev = GateEvent::new(EventKind::Superseded, "jobA", "build", 2).with_by_build(3);
        assert_eq!(ev.by_build, Some(3));
        assert_eq!(&*ev.job, "jobA");
    }
}
