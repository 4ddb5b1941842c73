//! Error types for synchronization.

use mirrordb_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during cloning or synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The source has no instances of the guard type.
    ///
    /// Raised before the destination is touched.
    #[error("refusing to sync: source has no {type_name} instances and the destination would be wiped")]
    DestructiveOperation {
        /// Type the guard checked.
        type_name: String,
    },

    /// A collection element cannot be cloned.
    #[error("unsupported element in {type_name}.{property}: {element}")]
    UnsupportedElement {
        /// Entity type owning the collection.
        type_name: String,
        /// Collection property.
        property: String,
        /// Description of the offending element.
        element: String,
    },

    /// The two stores do not share a compatible schema.
    #[error("schema mismatch on {type_name}: {reason}")]
    SchemaMismatch {
        /// Type that differs.
        type_name: String,
        /// What differs.
        reason: String,
    },

    /// Source and destination are the same store.
    #[error("source and destination are the same store")]
    SameStore,

    /// A referenced instance has no primary-key value.
    #[error("instance of {type_name} has no primary key value")]
    MissingPrimaryKey {
        /// Entity type of the instance.
        type_name: String,
    },

    /// Store error while reading the source or writing the destination.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates an unsupported element error.
    pub fn unsupported_element(
        type_name: impl Into<String>,
        property: impl Into<String>,
        element: impl Into<String>,
    ) -> Self {
        Self::UnsupportedElement {
            type_name: type_name.into(),
            property: property.into(),
            element: element.into(),
        }
    }

    /// Creates a schema mismatch error.
    pub fn schema_mismatch(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the destination is guaranteed untouched.
    ///
    /// Every error leaves the destination unchanged; this reports the ones
    /// raised before a write transaction was opened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SyncError::DestructiveOperation { .. }
                | SyncError::SchemaMismatch { .. }
                | SyncError::SameStore
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::DestructiveOperation {
            type_name: "Customer".into(),
        };
        assert!(err.to_string().contains("Customer"));

        let err = SyncError::unsupported_element("Order", "notes", "array");
        assert_eq!(err.to_string(), "unsupported element in Order.notes: array");
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::type_not_found("Ghost").into();
        assert!(matches!(err, SyncError::Store(StoreError::TypeNotFound { .. })));
        assert!(!err.is_precondition());
    }

    #[test]
    fn precondition_errors() {
        assert!(SyncError::SameStore.is_precondition());
        assert!(SyncError::schema_mismatch("Order", "missing").is_precondition());
        assert!(!SyncError::MissingPrimaryKey {
            type_name: "Order".into()
        }
        .is_precondition());
    }
}
