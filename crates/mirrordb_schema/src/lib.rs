//! # MirrorDB Schema
//!
//! Static schema registry and value model for MirrorDB.
//!
//! This crate provides:
//! - [`Value`], the scalar value type with canonical ordering
//! - [`Property`] and [`PropertyKind`] descriptors
//! - [`EntityType`] descriptors with an explicit primary key
//! - [`Schema`], a registry built once through [`SchemaBuilder`]
//!
//! ## Usage
//!
//! ```
//! use mirrordb_schema::{EntityType, Schema};
//!
//! let schema = Schema::builder()
//!     .entity(EntityType::builder("Customer").primary_key("id").scalar("name"))
//!     .entity(
//!         EntityType::builder("Order")
//!             .primary_key("id")
//!             .link("customer", "Customer"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.len(), 2);
//! assert!(schema.get("Order").unwrap().property("customer").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity_type;
mod error;
mod property;
mod schema;
mod value;

pub use entity_type::{EntityType, EntityTypeBuilder};
pub use error::{SchemaError, SchemaResult};
pub use property::{Property, PropertyKind};
pub use schema::{Schema, SchemaBuilder};
pub use value::Value;
