//! # MirrorDB Store
//!
//! Object store contract and the in-memory reference store.
//!
//! This crate provides:
//! - [`Object`], a handle to an entity instance (unattached or attached)
//! - [`ObjectStore`] and [`WriteTransaction`], the contract a store fulfils
//! - [`MemoryStore`], a snapshot-isolated store with a single writer
//!
//! ## Transactions
//!
//! A store has at most one write transaction open at a time. Changes made
//! through it are invisible to readers until [`WriteTransaction::commit`];
//! dropping the transaction discards them.
//!
//! ```
//! use std::sync::Arc;
//! use mirrordb_schema::{EntityType, Schema, Value};
//! use mirrordb_store::{MemoryStore, Object, ObjectStore, WriteTransaction};
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(EntityType::builder("Product").primary_key("sku").scalar("price"))
//!         .build()
//!         .unwrap(),
//! );
//! let store = MemoryStore::new(Arc::clone(&schema));
//!
//! let product = Object::new(Arc::clone(schema.get("Product").unwrap()));
//! product.set("sku", Value::from("p-1")).unwrap();
//! product.set("price", Value::from(250)).unwrap();
//!
//! let mut txn = store.begin_write().unwrap();
//! txn.add(&product, true).unwrap();
//! drop(txn);
//! assert_eq!(store.count("Product").unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod memory;
mod object;
mod record;
mod snapshot;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryTransaction};
pub use object::{GraphAnchor, ListItem, LiveObject, Object, PropertyValue};
pub use store::{ObjectStore, StoreId, WriteTransaction};
