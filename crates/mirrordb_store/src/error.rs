//! Error types for the store crate.

use mirrordb_schema::{PropertyKind, SchemaError, Value};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema definition error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot image could not be encoded or decoded.
    #[error("snapshot codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Entity type is not part of the store's schema.
    #[error("entity type not found: {type_name}")]
    TypeNotFound {
        /// Name that was looked up.
        type_name: String,
    },

    /// Property is not declared on the entity type.
    #[error("property {property} not found on {type_name}")]
    PropertyNotFound {
        /// Entity type searched.
        type_name: String,
        /// Missing property.
        property: String,
    },

    /// Value shape does not match the declared property kind.
    #[error("kind mismatch on {type_name}.{property}: expected {expected}, got {actual}")]
    KindMismatch {
        /// Entity type owning the property.
        type_name: String,
        /// Property being written.
        property: String,
        /// Declared kind.
        expected: PropertyKind,
        /// Description of the supplied value.
        actual: String,
    },

    /// Property cannot be assigned (backlinks are derived by the store).
    #[error("property {type_name}.{property} is read-only")]
    ReadOnlyProperty {
        /// Entity type owning the property.
        type_name: String,
        /// Read-only property.
        property: String,
    },

    /// Object has no usable primary-key value.
    #[error("object of type {type_name} has no primary key value")]
    MissingPrimaryKey {
        /// Entity type of the object.
        type_name: String,
    },

    /// Insert without update hit an existing primary key.
    #[error("duplicate primary key {key} in {type_name}")]
    DuplicatePrimaryKey {
        /// Entity type.
        type_name: String,
        /// Colliding key.
        key: Value,
    },

    /// Attached objects are read-only views.
    #[error("object of type {type_name} is attached to a store and cannot be modified")]
    ObjectAttached {
        /// Entity type of the object.
        type_name: String,
    },

    /// Object is unattached, or no longer exists in its store.
    #[error("object of type {type_name} is not a live object of this store")]
    ObjectInvalidated {
        /// Entity type of the object.
        type_name: String,
    },

    /// Object belongs to a different store.
    #[error("object of type {type_name} belongs to another store")]
    ForeignObject {
        /// Entity type of the object.
        type_name: String,
    },

    /// Embedded objects only exist inside an owner.
    #[error("embedded type {type_name} cannot be added or removed on its own")]
    EmbeddedObject {
        /// Entity type of the object.
        type_name: String,
    },

    /// The store was opened read-only.
    #[error("store {name} is read-only")]
    ReadOnlyStore {
        /// Configured store name.
        name: String,
    },
}

impl StoreError {
    /// Creates a type not found error.
    pub fn type_not_found(type_name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_name: type_name.into(),
        }
    }

    /// Creates a property not found error.
    pub fn property_not_found(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates a kind mismatch error.
    pub fn kind_mismatch(
        type_name: impl Into<String>,
        property: impl Into<String>,
        expected: PropertyKind,
        actual: impl Into<String>,
    ) -> Self {
        Self::KindMismatch {
            type_name: type_name.into(),
            property: property.into(),
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true if this error reports an undeclared property.
    pub fn is_property_not_found(&self) -> bool {
        matches!(self, StoreError::PropertyNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::kind_mismatch("Order", "customer", PropertyKind::Link, "text");
        assert_eq!(
            err.to_string(),
            "kind mismatch on Order.customer: expected link, got text"
        );

        let err = StoreError::DuplicatePrimaryKey {
            type_name: "Tag".into(),
            key: Value::from("red"),
        };
        assert!(err.to_string().contains("\"red\""));
    }

    #[test]
    fn property_not_found_detection() {
        assert!(StoreError::property_not_found("Order", "x").is_property_not_found());
        assert!(!StoreError::type_not_found("Order").is_property_not_found());
    }
}
