//! Gate core: the table of per-stage gates and the admission engine that
//! mutates it.

mod builder;
mod engine;
mod signal;
mod table;

pub use builder::GateBuilder;
pub use engine::AdmissionGate;
