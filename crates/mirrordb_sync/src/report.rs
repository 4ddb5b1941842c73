//! Outcome of a synchronization run.

use std::time::Duration;

/// Counts for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeReport {
    /// Entity type name.
    pub type_name: String,
    /// Source instances written to the destination.
    pub upserted: usize,
    /// Stale destination instances deleted.
    pub removed: usize,
}

/// Result of a synchronization run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Write order computed from the destination's dependency graph.
    ///
    /// Embedded types appear here but are not processed on their own.
    pub write_order: Vec<String>,
    /// Per-type counts for the processed top-level types, in write order.
    pub types: Vec<TypeReport>,
    /// Whether the changes were rolled back.
    pub dry_run: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncReport {
    /// Counts for `type_name`, if it was processed.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.type_name == type_name)
    }

    /// Total upserts across all types.
    #[must_use]
    pub fn total_upserted(&self) -> usize {
        self.types.iter().map(|t| t.upserted).sum()
    }

    /// Total removals across all types.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.types.iter().map(|t| t.removed).sum()
    }
}
