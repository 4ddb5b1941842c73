//! Error types for the schema crate.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two entity types share a name.
    #[error("duplicate entity type: {name}")]
    DuplicateType {
        /// Name of the duplicated type.
        name: String,
    },

    /// Two properties of one entity type share a name.
    #[error("duplicate property {property} on {type_name}")]
    DuplicateProperty {
        /// Entity type declaring the property.
        type_name: String,
        /// Name of the duplicated property.
        property: String,
    },

    /// A property or base refers to an entity type that is not registered.
    #[error("unknown entity type {target} referenced from {type_name}")]
    UnknownType {
        /// Entity type holding the reference.
        type_name: String,
        /// Name that could not be resolved.
        target: String,
    },

    /// A top-level entity type has no primary key.
    #[error("entity type {type_name} has no primary key")]
    MissingPrimaryKey {
        /// Entity type without a primary key.
        type_name: String,
    },

    /// A property declaration is inconsistent.
    #[error("invalid property {property} on {type_name}: {message}")]
    InvalidProperty {
        /// Entity type declaring the property.
        type_name: String,
        /// Offending property.
        property: String,
        /// Description of the problem.
        message: String,
    },

    /// A backlink does not invert a forward reference to its owner.
    #[error("invalid backlink {property} on {type_name}: {message}")]
    InvalidBacklink {
        /// Entity type declaring the backlink.
        type_name: String,
        /// Offending backlink property.
        property: String,
        /// Description of the problem.
        message: String,
    },
}

impl SchemaError {
    /// Creates an invalid property error.
    pub fn invalid_property(
        type_name: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            type_name: type_name.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid backlink error.
    pub fn invalid_backlink(
        type_name: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidBacklink {
            type_name: type_name.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
            target: target.into(),
        }
    }
}
