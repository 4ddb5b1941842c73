//! Configuration for the synchronizer.

/// Configuration for a synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Refuse to run when the source has no instances of the guard type.
    pub wipe_guard: bool,
    /// Type checked by the wipe guard.
    ///
    /// Defaults to the destination's first top-level type.
    pub guard_type: Option<String>,
    /// Reconcile inside the transaction, report, then roll back.
    pub dry_run: bool,
    /// Check that every destination type exists in the source with the
    /// same primary key before syncing.
    pub check_schema: bool,
}

impl SyncConfig {
    /// Creates a configuration with the wipe guard and schema check enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wipe_guard: true,
            guard_type: None,
            dry_run: false,
            check_schema: true,
        }
    }

    /// Enables or disables the wipe guard.
    #[must_use]
    pub fn with_wipe_guard(mut self, enabled: bool) -> Self {
        self.wipe_guard = enabled;
        self
    }

    /// Sets the type checked by the wipe guard.
    #[must_use]
    pub fn with_guard_type(mut self, type_name: impl Into<String>) -> Self {
        self.guard_type = Some(type_name.into());
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables or disables the schema compatibility check.
    #[must_use]
    pub fn with_schema_check(mut self, enabled: bool) -> Self {
        self.check_schema = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert!(config.wipe_guard);
        assert!(config.guard_type.is_none());
        assert!(!config.dry_run);
        assert!(config.check_schema);
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_wipe_guard(false)
            .with_guard_type("Order")
            .with_dry_run(true)
            .with_schema_check(false);

        assert!(!config.wipe_guard);
        assert_eq!(config.guard_type.as_deref(), Some("Order"));
        assert!(config.dry_run);
        assert!(!config.check_schema);
    }
}
