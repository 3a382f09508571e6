//! Event system: gate decisions published to subscribers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, GateEvent};
