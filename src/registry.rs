//! Build existence checks used by gate cleanup.
//!
//! A build can disappear without ever calling `exit` (deleted by an
//! operator, lost in a crash). Cleanup asks the [`BuildRegistry`] whether a
//! holding build still exists and prunes the ones that do not.

use async_trait::async_trait;

/// # Source of truth for which builds still exist.
///
/// Implemented by the pipeline runtime; consulted by cleanup to repair
/// state left behind by executions that vanished without releasing their
/// stages.
#[async_trait]
pub trait BuildRegistry: Send + Sync {
    /// Whether `build` of `job` still has a live record.
    async fn build_exists(&self, job: &str, build: u64) -> bool;
}

/// Registry that treats every build as existing.
///
/// Disables the pruning half of cleanup; useful for embedders that have no
/// build store and for tests that do not exercise cleanup.
pub struct AssumeLive;

#[async_trait]
impl BuildRegistry for AssumeLive {
    async fn build_exists(&self, _job: &str, _build: u64) -> bool {
        true
    }
}
