//! Property descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// A plain value.
    Scalar,
    /// An owned sub-entity, stored inline with its owner.
    Embedded,
    /// A shared reference to a top-level entity.
    Link,
    /// A list of plain values.
    ScalarList,
    /// A list of owned sub-entities.
    EmbeddedList,
    /// A list of shared references.
    LinkList,
}

impl PropertyKind {
    /// Returns true for list kinds.
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(
            self,
            PropertyKind::ScalarList | PropertyKind::EmbeddedList | PropertyKind::LinkList
        )
    }

    /// Returns true if values of this kind are entities.
    #[must_use]
    pub const fn is_entity(self) -> bool {
        !matches!(self, PropertyKind::Scalar | PropertyKind::ScalarList)
    }

    /// Returns true for owned (embedded) kinds.
    #[must_use]
    pub const fn is_embedded(self) -> bool {
        matches!(self, PropertyKind::Embedded | PropertyKind::EmbeddedList)
    }

    /// Returns true for shared-reference kinds.
    #[must_use]
    pub const fn is_link(self) -> bool {
        matches!(self, PropertyKind::Link | PropertyKind::LinkList)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Scalar => "scalar",
            PropertyKind::Embedded => "embedded",
            PropertyKind::Link => "link",
            PropertyKind::ScalarList => "list<scalar>",
            PropertyKind::EmbeddedList => "list<embedded>",
            PropertyKind::LinkList => "list<link>",
        };
        f.write_str(name)
    }
}

/// Describes one property of an entity type.
///
/// The flags are fixed when the schema is built. Backlinks are never
/// assigned by applications; the store derives them from the forward
/// property named by `backlink_origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) kind: PropertyKind,
    pub(crate) object_type: Option<String>,
    pub(crate) is_primary_key: bool,
    pub(crate) is_backlink: bool,
    pub(crate) backlink_origin: Option<String>,
    pub(crate) declared_in: String,
}

impl Property {
    pub(crate) fn new(
        name: impl Into<String>,
        kind: PropertyKind,
        object_type: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            object_type,
            is_primary_key: false,
            is_backlink: false,
            backlink_origin: None,
            declared_in: String::new(),
        }
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind.
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Target entity type for entity-valued kinds.
    ///
    /// For a backlink this is the type holding the forward reference.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        self.object_type.as_deref()
    }

    /// Whether this is the primary key of its type.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    /// Whether this is a derived inverse relation.
    #[must_use]
    pub fn is_backlink(&self) -> bool {
        self.is_backlink
    }

    /// The forward property a backlink inverts.
    #[must_use]
    pub fn backlink_origin(&self) -> Option<&str> {
        self.backlink_origin.as_deref()
    }

    /// Name of the entity type that declared this property.
    ///
    /// Differs from the owning type for inherited properties.
    #[must_use]
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }
}
