//! Entity graph cloner.
//!
//! Produces detached deep copies of store objects. Embedded objects are
//! copied by value together with their owner; linked objects are cloned
//! once per primary key and linked, so shared references stay shared and
//! reference cycles terminate. Backlinks and properties declared by
//! internal base types are never copied.
//!
//! Back-edges into a clone still being filled are weak handles. Every
//! handle a [`Cloner`] returns carries a [`GraphAnchor`] over all clones it
//! made, so any part of a cloned graph stays readable while one returned
//! handle (or an object read through it) is alive.

use crate::error::{SyncError, SyncResult};
use mirrordb_schema::{EntityType, Property, PropertyKind, Schema, Value};
use mirrordb_store::{GraphAnchor, ListItem, Object, PropertyValue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

type InstanceKey = (String, Value);

/// Deep-copies objects into unattached instances of `schema`'s types.
///
/// A `Cloner` remembers every keyed instance it has cloned. Cloning the
/// same instance again, directly or through a link, yields the existing
/// clone.
#[derive(Debug)]
pub struct Cloner<'s> {
    schema: &'s Schema,
    visited: HashMap<InstanceKey, Object>,
    in_progress: HashSet<InstanceKey>,
    anchor: GraphAnchor,
}

impl<'s> Cloner<'s> {
    /// Creates a cloner producing instances of `schema`'s types.
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            visited: HashMap::new(),
            in_progress: HashSet::new(),
            anchor: GraphAnchor::new(),
        }
    }

    /// Clones `source`; `None` clones to `None`.
    pub fn clone_object(&mut self, source: Option<&Object>) -> SyncResult<Option<Object>> {
        let clone = source.map(|s| self.clone_entity(s)).transpose()?;
        Ok(clone.map(|c| c.anchored(&self.anchor)))
    }

    /// Clones every object, sharing clones of common references.
    pub fn clone_all<'o>(
        &mut self,
        objects: impl IntoIterator<Item = &'o Object>,
    ) -> SyncResult<Vec<Object>> {
        objects
            .into_iter()
            .map(|o| Ok(self.clone_entity(o)?.anchored(&self.anchor)))
            .collect()
    }

    /// Number of keyed instances cloned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Returns true if nothing keyed has been cloned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    fn resolve(&self, source: &Object) -> SyncResult<Arc<EntityType>> {
        self.schema
            .get(source.type_name())
            .cloned()
            .ok_or_else(|| SyncError::schema_mismatch(source.type_name(), "type is not part of the target schema"))
    }

    fn clone_entity(&mut self, source: &Object) -> SyncResult<Object> {
        let entity_type = self.resolve(source)?;

        if entity_type.primary_key().is_none() {
            let clone = Object::new(Arc::clone(&entity_type));
            self.anchor.hold(&clone);
            self.copy_properties(&entity_type, source, &clone)?;
            return Ok(clone);
        }

        let key = source
            .primary_key()?
            .ok_or_else(|| SyncError::MissingPrimaryKey {
                type_name: entity_type.name().to_string(),
            })?;
        let id = (entity_type.name().to_string(), key);

        if let Some(existing) = self.visited.get(&id) {
            // A back-edge into a clone still being filled is held weakly.
            return Ok(if self.in_progress.contains(&id) {
                existing.downgrade()
            } else {
                existing.clone()
            });
        }

        let clone = Object::new(Arc::clone(&entity_type));
        self.anchor.hold(&clone);
        self.visited.insert(id.clone(), clone.clone());
        self.in_progress.insert(id.clone());
        trace!(type_name = %id.0, key = %id.1, "cloning instance");

        let result = self.copy_properties(&entity_type, source, &clone);
        self.in_progress.remove(&id);
        result?;
        Ok(clone)
    }

    fn copy_properties(
        &mut self,
        entity_type: &EntityType,
        source: &Object,
        clone: &Object,
    ) -> SyncResult<()> {
        for property in entity_type.properties() {
            if property.is_backlink() || !self.schema.is_user_type(property.declared_in()) {
                continue;
            }
            let value = match source.get(property.name()) {
                Ok(value) => value,
                Err(e) if e.is_property_not_found() => {
                    trace!(
                        type_name = entity_type.name(),
                        property = property.name(),
                        "source does not resolve property, skipping"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let value = self.clone_value(entity_type, property, value)?;
            clone.set(property.name(), value)?;
        }
        Ok(())
    }

    fn clone_value(
        &mut self,
        owner: &EntityType,
        property: &Property,
        value: PropertyValue,
    ) -> SyncResult<PropertyValue> {
        Ok(match value {
            PropertyValue::Value(v) => PropertyValue::Value(v),
            PropertyValue::Object(None) => PropertyValue::Object(None),
            PropertyValue::Object(Some(o)) => PropertyValue::Object(Some(self.clone_entity(&o)?)),
            PropertyValue::List(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_element(owner, property, item)?);
                }
                PropertyValue::List(cloned)
            }
        })
    }

    fn clone_element(
        &mut self,
        owner: &EntityType,
        property: &Property,
        item: ListItem,
    ) -> SyncResult<ListItem> {
        match (property.kind(), item) {
            (PropertyKind::ScalarList, ListItem::Value(v)) if !v.is_nested() => {
                Ok(ListItem::Value(v))
            }
            (PropertyKind::EmbeddedList | PropertyKind::LinkList, ListItem::Object(o))
                if self.accepts(property, &o) =>
            {
                Ok(ListItem::Object(self.clone_entity(&o)?))
            }
            (_, ListItem::Value(v)) => Err(SyncError::unsupported_element(
                owner.name(),
                property.name(),
                v.type_name(),
            )),
            (_, ListItem::Object(o)) => Err(SyncError::unsupported_element(
                owner.name(),
                property.name(),
                format!("object {}", o.type_name()),
            )),
        }
    }

    fn accepts(&self, property: &Property, element: &Object) -> bool {
        self.schema.is_user_type(element.type_name())
            && property.object_type() == Some(element.type_name())
    }
}

/// Clones a single object graph.
///
/// Returns `None` for `None`. Otherwise the result is a new unattached
/// instance of the same type in `schema`.
pub fn clone_object(source: Option<&Object>, schema: &Schema) -> SyncResult<Option<Object>> {
    Cloner::new(schema).clone_object(source)
}

/// Clones a sequence of objects with one shared visited set.
pub fn clone_all<'o>(
    objects: impl IntoIterator<Item = &'o Object>,
    schema: &Schema,
) -> SyncResult<Vec<Object>> {
    Cloner::new(schema).clone_all(objects)
}
