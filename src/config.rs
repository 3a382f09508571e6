//! Gate runtime configuration.
//!
//! [`GateConfig`] carries the few knobs the engine itself needs. Durability
//! and build lookup are injected as components (store, registry) rather
//! than configured here.

/// Configuration for an [`AdmissionGate`](crate::AdmissionGate).
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Capacity of the event bus ring buffer.
    ///
    /// Slow subscribers that lag behind more than this many events observe
    /// `Lagged` and skip older items. Minimum value is 1 (clamped by the
    /// bus).
    pub bus_capacity: usize,
}

impl GateConfig {
    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for GateConfig {
    /// Default configuration: `bus_capacity = 256`.
    fn default() -> Self {
        Self { bus_capacity: 256 }
    }
}
