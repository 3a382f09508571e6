//! # Deferred handle signals.
//!
//! Resuming or failing an execution may synchronously trigger another gate
//! operation, so no handle is ever signaled while the table lock is held.
//! Mutations record what to signal as a [`Signal`] batch; [`deliver`] runs
//! strictly after the critical section is released, in the order the
//! decisions were made.

use std::sync::Arc;

use tracing::warn;

use crate::error::GateError;
use crate::handle::ExecutionHandle;

/// One pending notification to an execution handle.
pub(crate) enum Signal {
    /// Admit: trace `message` to the execution's log, then resume it.
    Resume {
        handle: Arc<dyn ExecutionHandle>,
        message: String,
    },

    /// Inform only (e.g. "Waiting for builds [3]"); the execution stays
    /// parked.
    Trace {
        handle: Arc<dyn ExecutionHandle>,
        message: String,
    },

    /// Contention outcome: cancel the loser in favor of the winner.
    Supersede {
        loser: Arc<dyn ExecutionHandle>,
        loser_build: u64,
        winner: Arc<dyn ExecutionHandle>,
        winner_build: u64,
        /// Structured cause delivered to the loser, naming the winner.
        cause: GateError,
    },
}

/// Delivers a batch of signals. Must be called without the table lock.
pub(crate) fn deliver(signals: Vec<Signal>) {
    for signal in signals {
        match signal {
            Signal::Resume { handle, message } => {
                if handle.is_live() {
                    handle.trace(&message);
                    handle.resume();
                } else {
                    warn!(%message, "cannot resume execution, handle no longer live");
                }
            }
            Signal::Trace { handle, message } => {
                handle.trace(&message);
            }
            Signal::Supersede {
                loser,
                loser_build,
                winner,
                winner_build,
                cause,
            } => {
                // Both sides must still be reachable to run the protocol;
                // otherwise skip rather than fail half of it.
                if loser.is_live() && winner.is_live() {
                    loser.trace(&format!("Canceled since build #{winner_build} got here"));
                    winner.trace(&format!("Canceling older build #{loser_build}"));
                    loser.fail(cause);
                } else {
                    warn!(
                        loser_build,
                        winner_build, "cannot cancel, one of the executions is no longer live"
                    );
                }
            }
        }
    }
}
