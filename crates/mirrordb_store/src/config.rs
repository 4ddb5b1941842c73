//! Store configuration.

/// Configuration for opening a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name used in log output and errors.
    pub name: String,

    /// Rejects write transactions when set.
    pub read_only: bool,

    /// Whether [`MemoryStore::open`](crate::MemoryStore::open) starts empty
    /// when the snapshot file does not exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether the store rejects writes.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether opening a missing file creates an empty store.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.name, "memory");
        assert!(!config.read_only);
        assert!(config.create_if_missing);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .name("source")
            .read_only(true)
            .create_if_missing(false);

        assert_eq!(config.name, "source");
        assert!(config.read_only);
        assert!(!config.create_if_missing);
    }
}
