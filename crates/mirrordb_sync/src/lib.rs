//! # MirrorDB Sync
//!
//! Full-reconciliation synchronization between two object stores sharing a
//! schema.
//!
//! This crate provides:
//! - [`Cloner`], [`clone_object`] and [`clone_all`]: detached deep copies of
//!   entity graphs, with cycle-safe handling of shared references
//! - [`DependencyGraph`]: the type-level reference graph and its write order
//! - [`Synchronizer`] and [`synchronize`]: the reconciliation pass itself
//!
//! ## Key Invariants
//!
//! - Backlinks are never copied; the destination recomputes them
//! - Embedded objects are copied with their owner, links are cloned once
//! - Primary keys are compared by value
//! - A run commits everything or nothing
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use mirrordb_schema::{EntityType, Schema, Value};
//! use mirrordb_store::{MemoryStore, Object, ObjectStore, WriteTransaction};
//! use mirrordb_sync::{synchronize, SyncError};
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(EntityType::builder("Tag").primary_key("name"))
//!         .build()
//!         .unwrap(),
//! );
//! let source = MemoryStore::new(Arc::clone(&schema));
//! let destination = MemoryStore::new(Arc::clone(&schema));
//!
//! let tag = Object::new(Arc::clone(schema.get("Tag").unwrap()));
//! tag.set("name", Value::from("urgent")).unwrap();
//! source
//!     .write(|txn| -> Result<(), SyncError> { Ok(txn.add(&tag, true)?) })
//!     .unwrap();
//!
//! let report = synchronize(&source, &destination).unwrap();
//! assert_eq!(report.total_upserted(), 1);
//! assert_eq!(destination.count("Tag").unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cloner;
mod config;
mod engine;
mod error;
mod graph;
mod report;

pub use cloner::{clone_all, clone_object, Cloner};
pub use config::SyncConfig;
pub use engine::{synchronize, Synchronizer};
pub use error::{SyncError, SyncResult};
pub use graph::DependencyGraph;
pub use report::{SyncReport, TypeReport};
