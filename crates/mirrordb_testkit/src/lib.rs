//! # MirrorDB Testkit
//!
//! Test utilities for MirrorDB.
//!
//! This crate provides:
//! - Fixture schemas (a small shop, and schemas with reference cycles)
//! - Object builders and store helpers
//! - Property-based dataset generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use mirrordb_store::ObjectStore;
//! use mirrordb_testkit::prelude::*;
//!
//! init_tracing();
//! let schema = shop_schema();
//! let store = TestStore::memory(&schema);
//! put(&store, &[customer(&schema, 1, "Ada")]);
//! assert_eq!(store.count("Customer").unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test harness so it is captured per test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
