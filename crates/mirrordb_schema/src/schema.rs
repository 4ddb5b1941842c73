//! Schema registry.

use crate::entity_type::{EntityType, EntityTypeBuilder};
use crate::error::{SchemaError, SchemaResult};
use crate::property::Property;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Registered role of a type inside the schema builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    TopLevel,
    Embedded,
    InternalBase,
}

/// A validated, immutable set of entity types.
///
/// The registry is built once and shared behind an `Arc`. Besides the
/// types themselves it records the allow-list of user-schema types:
/// internal base types contribute properties to the types inheriting
/// them but are neither enumerable nor part of the allow-list.
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<Arc<EntityType>>,
    index: HashMap<String, usize>,
    internal: Vec<Arc<EntityType>>,
    user_types: BTreeSet<String>,
}

impl Schema {
    /// Starts building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// All user types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.types.iter()
    }

    /// Looks up a user type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.index.get(name).map(|&idx| &self.types[idx])
    }

    /// Returns true if a user type named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The first registered user type.
    #[must_use]
    pub fn first(&self) -> Option<&Arc<EntityType>> {
        self.types.first()
    }

    /// The first registered type that is not embedded.
    #[must_use]
    pub fn first_top_level(&self) -> Option<&Arc<EntityType>> {
        self.types.iter().find(|t| !t.is_embedded())
    }

    /// Number of user types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no user types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether `name` belongs to the user schema (as opposed to an internal base).
    #[must_use]
    pub fn is_user_type(&self, name: &str) -> bool {
        self.user_types.contains(name)
    }

    /// Internal base types, in registration order.
    pub fn internal_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.internal.iter()
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    entries: Vec<(EntityTypeBuilder, Role)>,
}

impl SchemaBuilder {
    /// Registers a top-level entity type (must declare a primary key).
    #[must_use]
    pub fn entity(mut self, builder: EntityTypeBuilder) -> Self {
        self.entries.push((builder, Role::TopLevel));
        self
    }

    /// Registers an embedded entity type (no primary key).
    #[must_use]
    pub fn embedded(mut self, builder: EntityTypeBuilder) -> Self {
        self.entries.push((builder, Role::Embedded));
        self
    }

    /// Registers an internal base type.
    ///
    /// Its properties can be inherited by user types but are never part of
    /// the user schema.
    #[must_use]
    pub fn internal_base(mut self, builder: EntityTypeBuilder) -> Self {
        self.entries.push((builder, Role::InternalBase));
        self
    }

    /// Validates the registered types and builds the registry.
    pub fn build(self) -> SchemaResult<Schema> {
        let mut seen = HashSet::new();
        for (builder, _) in &self.entries {
            if !seen.insert(builder.name.clone()) {
                return Err(SchemaError::DuplicateType {
                    name: builder.name.clone(),
                });
            }
        }

        let roles: HashMap<&str, Role> = self
            .entries
            .iter()
            .map(|(b, role)| (b.name.as_str(), *role))
            .collect();

        let mut bases: HashMap<String, Vec<Property>> = HashMap::new();
        let mut types = Vec::new();
        let mut internal = Vec::new();

        for (builder, role) in &self.entries {
            let entity_type = Self::resolve(builder, *role, &bases)?;
            if *role == Role::InternalBase {
                bases.insert(entity_type.name.clone(), entity_type.properties.clone());
                internal.push(Arc::new(entity_type));
            } else {
                types.push(entity_type);
            }
        }

        for entity_type in &types {
            for property in &entity_type.properties {
                Self::check_target(entity_type, property, &roles)?;
            }
        }
        for entity_type in &types {
            for property in entity_type.backlinks() {
                Self::check_backlink(entity_type, property, &types)?;
            }
        }

        let index = types
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.name.clone(), idx))
            .collect();
        let user_types = types.iter().map(|t| t.name.clone()).collect();

        Ok(Schema {
            types: types.into_iter().map(Arc::new).collect(),
            index,
            internal,
            user_types,
        })
    }

    /// Flattens inheritance and checks primary-key rules for one type.
    fn resolve(
        builder: &EntityTypeBuilder,
        role: Role,
        bases: &HashMap<String, Vec<Property>>,
    ) -> SchemaResult<EntityType> {
        let mut properties: Vec<Property> = builder
            .properties
            .iter()
            .cloned()
            .map(|mut p| {
                p.declared_in = builder.name.clone();
                p
            })
            .collect();

        for base in &builder.bases {
            let inherited = bases
                .get(base)
                .ok_or_else(|| SchemaError::unknown_type(&builder.name, base))?;
            properties.extend(inherited.iter().cloned());
        }

        let mut names = HashSet::new();
        for property in &properties {
            if !names.insert(property.name.as_str()) {
                return Err(SchemaError::DuplicateProperty {
                    type_name: builder.name.clone(),
                    property: property.name.clone(),
                });
            }
        }

        let keys: Vec<usize> = properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_primary_key)
            .map(|(idx, _)| idx)
            .collect();

        let primary_key = match (role, keys.as_slice()) {
            (Role::TopLevel, []) => {
                return Err(SchemaError::MissingPrimaryKey {
                    type_name: builder.name.clone(),
                })
            }
            (Role::TopLevel, [idx]) => Some(*idx),
            (Role::TopLevel, [_, second, ..]) => {
                return Err(SchemaError::invalid_property(
                    &builder.name,
                    &properties[*second].name,
                    "more than one primary key",
                ))
            }
            (_, []) => None,
            (_, [idx, ..]) => {
                return Err(SchemaError::invalid_property(
                    &builder.name,
                    &properties[*idx].name,
                    "only top-level types can declare a primary key",
                ))
            }
        };

        Ok(EntityType {
            name: builder.name.clone(),
            properties,
            primary_key,
            embedded: role == Role::Embedded,
        })
    }

    fn check_target(
        entity_type: &EntityType,
        property: &Property,
        roles: &HashMap<&str, Role>,
    ) -> SchemaResult<()> {
        if !property.kind.is_entity() {
            return Ok(());
        }
        let target = property.object_type.as_deref().unwrap_or_default();
        let role = match roles.get(target) {
            Some(Role::InternalBase) | None => {
                return Err(SchemaError::unknown_type(&entity_type.name, target))
            }
            Some(role) => *role,
        };

        if property.kind.is_embedded() && role != Role::Embedded {
            return Err(SchemaError::invalid_property(
                &entity_type.name,
                &property.name,
                format!("{target} is not an embedded type"),
            ));
        }
        if property.kind.is_link() && role != Role::TopLevel {
            return Err(SchemaError::invalid_property(
                &entity_type.name,
                &property.name,
                format!("{target} is embedded and cannot be linked"),
            ));
        }
        Ok(())
    }

    fn check_backlink(
        entity_type: &EntityType,
        property: &Property,
        types: &[EntityType],
    ) -> SchemaResult<()> {
        let origin_type = property.object_type.as_deref().unwrap_or_default();
        let origin_property = property.backlink_origin.as_deref().unwrap_or_default();

        let origin = types
            .iter()
            .find(|t| t.name == origin_type)
            .and_then(|t| t.property(origin_property))
            .ok_or_else(|| {
                SchemaError::invalid_backlink(
                    &entity_type.name,
                    &property.name,
                    format!("{origin_type}.{origin_property} does not exist"),
                )
            })?;

        if origin.is_backlink
            || !origin.kind.is_link()
            || origin.object_type.as_deref() != Some(entity_type.name.as_str())
        {
            return Err(SchemaError::invalid_backlink(
                &entity_type.name,
                &property.name,
                format!(
                    "{origin_type}.{origin_property} is not a link to {}",
                    entity_type.name
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> SchemaBuilder {
        Schema::builder()
            .internal_base(EntityType::builder("Audit").scalar("revision"))
            .entity(
                EntityType::builder("Customer")
                    .primary_key("id")
                    .scalar("name")
                    .embedded("address", "Address")
                    .backlink("orders", "Order", "customer")
                    .inherit("Audit"),
            )
            .embedded(EntityType::builder("Address").scalar("city"))
            .entity(
                EntityType::builder("Order")
                    .primary_key("id")
                    .link("customer", "Customer"),
            )
    }

    #[test]
    fn builds_valid_schema() {
        let schema = shop().build().unwrap();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.first().unwrap().name(), "Customer");
        assert!(schema.get("Address").unwrap().is_embedded());
        assert_eq!(
            schema.get("Order").unwrap().primary_key().unwrap().name(),
            "id"
        );
        assert!(!schema.contains("Audit"));
        assert_eq!(schema.internal_types().count(), 1);
    }

    #[test]
    fn inherited_properties_keep_declaring_type() {
        let schema = shop().build().unwrap();
        let customer = schema.get("Customer").unwrap();

        assert_eq!(customer.property("name").unwrap().declared_in(), "Customer");
        assert_eq!(customer.property("revision").unwrap().declared_in(), "Audit");
        assert!(schema.is_user_type("Customer"));
        assert!(!schema.is_user_type("Audit"));
    }

    #[test]
    fn first_top_level_skips_embedded() {
        let schema = Schema::builder()
            .embedded(EntityType::builder("Address").scalar("city"))
            .entity(EntityType::builder("Customer").primary_key("id"))
            .build()
            .unwrap();

        assert_eq!(schema.first().unwrap().name(), "Address");
        assert_eq!(schema.first_top_level().unwrap().name(), "Customer");
    }

    #[test]
    fn rejects_duplicate_type() {
        let err = shop()
            .entity(EntityType::builder("Order").primary_key("id"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType { name: "Order".into() });
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = Schema::builder()
            .entity(EntityType::builder("Tag").scalar("name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingPrimaryKey { .. }));
    }

    #[test]
    fn rejects_primary_key_on_embedded() {
        let err = Schema::builder()
            .embedded(EntityType::builder("Address").primary_key("id"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidProperty { .. }));
    }

    #[test]
    fn rejects_unknown_target() {
        let err = Schema::builder()
            .entity(
                EntityType::builder("Order")
                    .primary_key("id")
                    .link("customer", "Nobody"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn rejects_link_to_embedded() {
        let err = Schema::builder()
            .embedded(EntityType::builder("Address").scalar("city"))
            .entity(
                EntityType::builder("Customer")
                    .primary_key("id")
                    .link("address", "Address"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidProperty { .. }));
    }

    #[test]
    fn rejects_backlink_without_forward_link() {
        let err = Schema::builder()
            .entity(
                EntityType::builder("Customer")
                    .primary_key("id")
                    .backlink("orders", "Order", "buyer"),
            )
            .entity(
                EntityType::builder("Order")
                    .primary_key("id")
                    .link("customer", "Customer"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBacklink { .. }));
    }

    #[test]
    fn rejects_duplicate_inherited_property() {
        let err = Schema::builder()
            .internal_base(EntityType::builder("Audit").scalar("name"))
            .entity(
                EntityType::builder("Tag")
                    .primary_key("id")
                    .scalar("name")
                    .inherit("Audit"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateProperty { .. }));
    }
}
