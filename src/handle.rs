//! # Execution handles: the gate's view of a suspended pipeline execution.
//!
//! The gate never runs pipeline code itself. When an execution asks to enter
//! a stage, it hands the gate an [`ExecutionHandle`] (an opaque, signalable
//! reference to itself) and suspends. Later, from *someone else's* call to
//! `enter` or `exit`, the gate signals that handle to let the execution
//! proceed or to cancel it.
//!
//! All handle methods are synchronous and must be cheap: they are invoked
//! after the gate's critical section is released, and must never need the
//! gate lock themselves (resuming an execution may synchronously trigger
//! another gate operation).
//!
//! [`SuspendedExecution`] is the built-in tokio-backed implementation; a
//! pipeline runtime with its own suspension machinery can implement the
//! trait directly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::GateError;

/// Locks ignoring poisoning; handle state stays usable even if a signaling
/// thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Signalable reference to a suspended execution.
///
/// The gate stores a handle only while its execution occupies a stage's
/// single waiting slot, and drops the reference once the execution has been
/// resumed, failed, or evicted.
///
/// Implementations must tolerate signals arriving after the underlying
/// execution is gone: `resume`/`fail`/`trace` on a dead handle are no-ops,
/// and [`is_live`](ExecutionHandle::is_live) reports whether signaling can
/// still reach the execution.
pub trait ExecutionHandle: Send + Sync {
    /// Unblocks the execution; it was admitted into the stage.
    fn resume(&self);

    /// Aborts the execution with the given cause.
    fn fail(&self, cause: GateError);

    /// Whether the underlying execution still exists and can be signaled.
    fn is_live(&self) -> bool;

    /// Delivers a human-readable line to the execution's own log.
    fn trace(&self, message: &str);
}

/// # Tokio-backed suspended execution.
///
/// Created in a pair with [`Admission`]: the handle side goes to
/// [`AdmissionGate::enter`](crate::AdmissionGate::enter), the admission side
/// is awaited by the execution.
///
/// ```
/// use stagegate::SuspendedExecution;
/// # use stagegate::ExecutionHandle;
///
/// # async fn demo() -> Result<(), stagegate::GateError> {
/// let (handle, admission) = SuspendedExecution::new();
/// // gate.enter("job", "deploy", 42, handle, Some(1)).await?;
/// # handle.resume();
/// admission.admitted().await?;
/// // ... inside the stage ...
/// # Ok(())
/// # }
/// ```
pub struct SuspendedExecution {
    outcome: Mutex<Option<oneshot::Sender<Result<(), GateError>>>>,
    messages: Mutex<Vec<String>>,
}

impl SuspendedExecution {
    /// Creates a handle/admission pair for one suspension.
    pub fn new() -> (Arc<Self>, Admission) {
        let (tx, rx) = oneshot::channel();
        let handle = Arc::new(Self {
            outcome: Mutex::new(Some(tx)),
            messages: Mutex::new(Vec::new()),
        });
        (handle, Admission { rx })
    }

    /// Lines delivered via [`ExecutionHandle::trace`], oldest first.
    ///
    /// The gate uses traces for per-execution console output ("Waiting for
    /// builds …", "Canceled since …"); embedders can forward them to a real
    /// build log.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    fn send(&self, outcome: Result<(), GateError>) {
        let sender = lock(&self.outcome).take();
        if let Some(tx) = sender {
            // Receiver may have been dropped; nothing left to signal then.
            let _ = tx.send(outcome);
        }
    }
}

impl ExecutionHandle for SuspendedExecution {
    fn resume(&self) {
        self.send(Ok(()));
    }

    fn fail(&self, cause: GateError) {
        self.send(Err(cause));
    }

    fn is_live(&self) -> bool {
        match lock(&self.outcome).as_ref() {
            Some(tx) => !tx.is_closed(),
            None => false,
        }
    }

    fn trace(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}

/// Awaitable side of a [`SuspendedExecution`].
///
/// Resolves once the gate signals the paired handle.
pub struct Admission {
    rx: oneshot::Receiver<Result<(), GateError>>,
}

impl Admission {
    /// Waits until the execution is admitted or cancelled.
    ///
    /// Returns [`GateError::Detached`] if the handle was dropped without a
    /// signal (e.g. the gate was reset while this execution was parked).
    pub async fn admitted(self) -> Result<(), GateError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(GateError::Detached),
        }
    }
}
