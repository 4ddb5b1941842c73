//! Entity type descriptors.

use crate::property::{Property, PropertyKind};

/// Schema-level description of a kind of record.
///
/// Properties keep declaration order: own properties first, then
/// inherited ones in the order their bases were listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) properties: Vec<Property>,
    pub(crate) primary_key: Option<usize>,
    pub(crate) embedded: bool,
}

impl EntityType {
    /// Starts describing a new entity type.
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All properties, backlinks included.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The primary-key property. `None` for embedded types.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Property> {
        self.primary_key.map(|idx| &self.properties[idx])
    }

    /// Whether instances only exist inside an owner.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Properties that hold application-assigned data (everything but backlinks).
    pub fn forward_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.is_backlink)
    }

    /// Derived inverse-relation properties.
    pub fn backlinks(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_backlink)
    }
}

/// Builder for [`EntityType`].
///
/// Validation happens when the owning [`SchemaBuilder`](crate::SchemaBuilder)
/// is built.
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    pub(crate) name: String,
    pub(crate) properties: Vec<Property>,
    pub(crate) bases: Vec<String>,
}

impl EntityTypeBuilder {
    /// Creates a builder for a type named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            bases: Vec::new(),
        }
    }

    fn push(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds the primary-key property (a scalar).
    #[must_use]
    pub fn primary_key(self, name: impl Into<String>) -> Self {
        let mut property = Property::new(name, PropertyKind::Scalar, None);
        property.is_primary_key = true;
        self.push(property)
    }

    /// Adds a scalar property.
    #[must_use]
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.push(Property::new(name, PropertyKind::Scalar, None))
    }

    /// Adds a list-of-scalars property.
    #[must_use]
    pub fn scalar_list(self, name: impl Into<String>) -> Self {
        self.push(Property::new(name, PropertyKind::ScalarList, None))
    }

    /// Adds an owned sub-entity property.
    #[must_use]
    pub fn embedded(self, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        self.push(Property::new(
            name,
            PropertyKind::Embedded,
            Some(object_type.into()),
        ))
    }

    /// Adds a list of owned sub-entities.
    #[must_use]
    pub fn embedded_list(self, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        self.push(Property::new(
            name,
            PropertyKind::EmbeddedList,
            Some(object_type.into()),
        ))
    }

    /// Adds a shared reference to another top-level type.
    #[must_use]
    pub fn link(self, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        self.push(Property::new(
            name,
            PropertyKind::Link,
            Some(object_type.into()),
        ))
    }

    /// Adds a list of shared references.
    #[must_use]
    pub fn link_list(self, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        self.push(Property::new(
            name,
            PropertyKind::LinkList,
            Some(object_type.into()),
        ))
    }

    /// Adds a backlink: every `origin_type` whose `origin_property` points here.
    #[must_use]
    pub fn backlink(
        self,
        name: impl Into<String>,
        origin_type: impl Into<String>,
        origin_property: impl Into<String>,
    ) -> Self {
        let mut property = Property::new(name, PropertyKind::LinkList, Some(origin_type.into()));
        property.is_backlink = true;
        property.backlink_origin = Some(origin_property.into());
        self.push(property)
    }

    /// Inherits the properties of a previously registered base type.
    #[must_use]
    pub fn inherit(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }
}
