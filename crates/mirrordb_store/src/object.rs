//! Entity instances.
//!
//! An [`Object`] is a cheap handle. It is either unattached (it owns its
//! property values and can be modified) or attached (a read-only live view
//! supplied by a store through [`LiveObject`]).

use crate::error::{StoreError, StoreResult};
use crate::store::StoreId;
use mirrordb_schema::{EntityType, Property, PropertyKind, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Value of one property, shaped by the property's kind.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Scalar property value.
    Value(Value),
    /// Embedded or link property value.
    Object(Option<Object>),
    /// Collection property value.
    List(Vec<ListItem>),
}

/// One element of a collection property.
#[derive(Debug, Clone)]
pub enum ListItem {
    /// Scalar element.
    Value(Value),
    /// Entity element (embedded or linked).
    Object(Object),
}

impl PropertyValue {
    /// The value a property of `kind` holds before anything is assigned.
    #[must_use]
    pub fn default_for(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Scalar => PropertyValue::Value(Value::Null),
            PropertyKind::Embedded | PropertyKind::Link => PropertyValue::Object(None),
            PropertyKind::ScalarList | PropertyKind::EmbeddedList | PropertyKind::LinkList => {
                PropertyValue::List(Vec::new())
            }
        }
    }

    /// Returns the scalar, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropertyValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the referenced object, if this is a non-null entity value.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            PropertyValue::Object(o) => o.as_ref(),
            _ => None,
        }
    }

    /// Returns the elements, if this is a collection.
    #[must_use]
    pub fn as_list(&self) -> Option<&[ListItem]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            PropertyValue::Value(v) => v.type_name().to_string(),
            PropertyValue::Object(None) => "null object".to_string(),
            PropertyValue::Object(Some(o)) => format!("object {}", o.type_name()),
            PropertyValue::List(items) => format!("list[{}]", items.len()),
        }
    }

    fn anchored(self, anchor: &GraphAnchor) -> Self {
        match self {
            PropertyValue::Object(Some(o)) => PropertyValue::Object(Some(o.anchored(anchor))),
            PropertyValue::List(items) => PropertyValue::List(
                items.into_iter().map(|item| item.anchored(anchor)).collect(),
            ),
            other => other,
        }
    }

    fn unanchored(self) -> Self {
        match self {
            PropertyValue::Object(Some(o)) => PropertyValue::Object(Some(o.unanchored())),
            PropertyValue::List(items) => {
                PropertyValue::List(items.into_iter().map(ListItem::unanchored).collect())
            }
            other => other,
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        PropertyValue::Value(v)
    }
}

impl From<Object> for PropertyValue {
    fn from(o: Object) -> Self {
        PropertyValue::Object(Some(o))
    }
}

impl From<Option<Object>> for PropertyValue {
    fn from(o: Option<Object>) -> Self {
        PropertyValue::Object(o)
    }
}

impl From<Vec<ListItem>> for PropertyValue {
    fn from(items: Vec<ListItem>) -> Self {
        PropertyValue::List(items)
    }
}

impl ListItem {
    /// Returns the entity element, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            ListItem::Object(o) => Some(o),
            ListItem::Value(_) => None,
        }
    }

    /// Returns the scalar element, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ListItem::Value(v) => Some(v),
            ListItem::Object(_) => None,
        }
    }

    fn anchored(self, anchor: &GraphAnchor) -> Self {
        match self {
            ListItem::Object(o) => ListItem::Object(o.anchored(anchor)),
            value => value,
        }
    }

    fn unanchored(self) -> Self {
        match self {
            ListItem::Object(o) => ListItem::Object(o.unanchored()),
            value => value,
        }
    }
}

/// Read access to a store-resident record.
///
/// Stores implement this to hand out attached [`Object`]s.
pub trait LiveObject: Send + Sync + fmt::Debug {
    /// Store the record lives in.
    fn store_id(&self) -> StoreId;

    /// Entity type of the record.
    fn entity_type(&self) -> &Arc<EntityType>;

    /// Reads a declared property. Backlinks are computed by the store.
    fn get(&self, property: &Property) -> StoreResult<PropertyValue>;

    /// Primary-key value, `None` for embedded records.
    fn primary_key(&self) -> Option<Value>;

    /// Whether the record still exists in its store.
    fn is_valid(&self) -> bool;
}

type Fields = Arc<RwLock<BTreeMap<String, PropertyValue>>>;

/// Keeps every member of an unattached object graph alive.
///
/// Back-edges in a cyclic graph are weak handles. A handle carrying an
/// anchor holds every member the anchor holds, so a member reached through
/// it stays readable after the graph's other handles are dropped. Values
/// stored into a property never carry an anchor, which keeps the graph free
/// of reference cycles.
#[derive(Clone, Default)]
pub struct GraphAnchor {
    members: Arc<Mutex<Vec<Fields>>>,
}

impl GraphAnchor {
    /// Creates an anchor holding nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `object` alive for as long as the anchor lives.
    ///
    /// Attached and weak handles are ignored.
    pub fn hold(&self, object: &Object) {
        if let Repr::Unattached { fields, .. } = &object.repr {
            self.members.lock().push(Arc::clone(fields));
        }
    }

    /// Number of held objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl fmt::Debug for GraphAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphAnchor")
            .field("members", &self.len())
            .finish()
    }
}

#[derive(Clone)]
enum Repr {
    Unattached {
        entity_type: Arc<EntityType>,
        fields: Fields,
    },
    /// Non-owning handle to an unattached object, used for back-edges in
    /// cyclic graphs.
    Weak {
        entity_type: Arc<EntityType>,
        fields: Weak<RwLock<BTreeMap<String, PropertyValue>>>,
    },
    Attached(Arc<dyn LiveObject>),
}

/// A live or unattached entity instance.
#[derive(Clone)]
pub struct Object {
    repr: Repr,
    anchor: Option<GraphAnchor>,
}

impl Object {
    /// Creates an unattached instance with every property unset.
    #[must_use]
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        Self {
            repr: Repr::Unattached {
                entity_type,
                fields: Arc::new(RwLock::new(BTreeMap::new())),
            },
            anchor: None,
        }
    }

    /// Wraps a store-resident record.
    #[must_use]
    pub fn attached(live: Arc<dyn LiveObject>) -> Self {
        Self {
            repr: Repr::Attached(live),
            anchor: None,
        }
    }

    /// Entity type of this instance.
    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        match &self.repr {
            Repr::Unattached { entity_type, .. } | Repr::Weak { entity_type, .. } => entity_type,
            Repr::Attached(live) => live.entity_type(),
        }
    }

    /// Entity type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.entity_type().name()
    }

    /// Whether this is a live view of a store record.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        matches!(self.repr, Repr::Attached(_))
    }

    /// Store this object lives in, if attached.
    #[must_use]
    pub fn store_id(&self) -> Option<StoreId> {
        match &self.repr {
            Repr::Attached(live) => Some(live.store_id()),
            _ => None,
        }
    }

    /// Whether the object can still be read.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match &self.repr {
            Repr::Unattached { .. } => true,
            Repr::Weak { fields, .. } => fields.strong_count() > 0,
            Repr::Attached(live) => live.is_valid(),
        }
    }

    /// Returns a handle that does not keep an unattached object alive.
    ///
    /// Attached handles are returned unchanged.
    #[must_use]
    pub fn downgrade(&self) -> Object {
        match &self.repr {
            Repr::Unattached {
                entity_type,
                fields,
            } => Object {
                repr: Repr::Weak {
                    entity_type: Arc::clone(entity_type),
                    fields: Arc::downgrade(fields),
                },
                anchor: None,
            },
            Repr::Weak { .. } => self.unanchored(),
            Repr::Attached(_) => self.clone(),
        }
    }

    /// Returns a handle that keeps everything `anchor` holds alive.
    ///
    /// Objects read through the returned handle carry the same anchor.
    /// Attached handles are returned unchanged.
    #[must_use]
    pub fn anchored(&self, anchor: &GraphAnchor) -> Object {
        match &self.repr {
            Repr::Attached(_) => self.clone(),
            repr => Object {
                repr: repr.clone(),
                anchor: Some(anchor.clone()),
            },
        }
    }

    fn unanchored(&self) -> Object {
        Object {
            repr: self.repr.clone(),
            anchor: None,
        }
    }

    /// Whether both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        match (self.fields_ptr(), other.fields_ptr()) {
            (Some(a), Some(b)) => a == b,
            _ => match (&self.repr, &other.repr) {
                (Repr::Attached(a), Repr::Attached(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
        }
    }

    fn fields_ptr(&self) -> Option<*const RwLock<BTreeMap<String, PropertyValue>>> {
        match &self.repr {
            Repr::Unattached { fields, .. } => Some(Arc::as_ptr(fields)),
            Repr::Weak { fields, .. } => Some(fields.as_ptr()),
            Repr::Attached(_) => None,
        }
    }

    fn upgrade(&self) -> StoreResult<Option<Fields>> {
        match &self.repr {
            Repr::Unattached { fields, .. } => Ok(Some(Arc::clone(fields))),
            Repr::Weak { fields, .. } => fields
                .upgrade()
                .map(Some)
                .ok_or_else(|| StoreError::ObjectInvalidated {
                    type_name: self.type_name().to_string(),
                }),
            Repr::Attached(_) => Ok(None),
        }
    }

    fn property(&self, name: &str) -> StoreResult<&Property> {
        self.entity_type()
            .property(name)
            .ok_or_else(|| StoreError::property_not_found(self.type_name(), name))
    }

    /// Reads a property by name.
    ///
    /// Unset properties read as their kind's default. Backlinks on an
    /// unattached object are always empty.
    pub fn get(&self, name: &str) -> StoreResult<PropertyValue> {
        let property = self.property(name)?;
        if let Repr::Attached(live) = &self.repr {
            return live.get(property);
        }
        if property.is_backlink() {
            return Ok(PropertyValue::List(Vec::new()));
        }
        let fields = self.upgrade()?.ok_or_else(|| StoreError::ObjectInvalidated {
            type_name: self.type_name().to_string(),
        })?;
        let value = fields.read().get(name).cloned();
        let value = value.unwrap_or_else(|| PropertyValue::default_for(property.kind()));
        Ok(match &self.anchor {
            Some(anchor) => value.anchored(anchor),
            None => value,
        })
    }

    /// Assigns a property on an unattached object.
    ///
    /// The value must match the declared kind. Collection elements are
    /// checked when the object is written to a store.
    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> StoreResult<()> {
        let property = self.property(name)?;
        if self.is_attached() {
            return Err(StoreError::ObjectAttached {
                type_name: self.type_name().to_string(),
            });
        }
        if property.is_backlink() {
            return Err(StoreError::ReadOnlyProperty {
                type_name: self.type_name().to_string(),
                property: name.to_string(),
            });
        }

        let value = value.into().unanchored();
        self.check_shape(property, &value)?;

        if let Some(fields) = self.upgrade()? {
            fields.write().insert(name.to_string(), value);
        }
        Ok(())
    }

    fn check_shape(&self, property: &Property, value: &PropertyValue) -> StoreResult<()> {
        let matches = match (property.kind(), value) {
            (PropertyKind::Scalar, PropertyValue::Value(_)) => true,
            (PropertyKind::Embedded | PropertyKind::Link, PropertyValue::Object(None)) => true,
            (PropertyKind::Embedded | PropertyKind::Link, PropertyValue::Object(Some(o))) => {
                property.object_type() == Some(o.type_name())
            }
            (kind, PropertyValue::List(_)) => kind.is_collection(),
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(StoreError::kind_mismatch(
                self.type_name(),
                property.name(),
                property.kind(),
                value.describe(),
            ))
        }
    }

    /// Primary-key value. `None` for embedded types or an unset key.
    pub fn primary_key(&self) -> StoreResult<Option<Value>> {
        if let Repr::Attached(live) = &self.repr {
            return Ok(live.primary_key());
        }
        let Some(key) = self.entity_type().primary_key() else {
            return Ok(None);
        };
        match self.get(key.name())? {
            PropertyValue::Value(Value::Null) => Ok(None),
            PropertyValue::Value(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Primary-key value, failing when there is none.
    pub fn require_primary_key(&self) -> StoreResult<Value> {
        self.primary_key()?
            .ok_or_else(|| StoreError::MissingPrimaryKey {
                type_name: self.type_name().to_string(),
            })
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.repr {
            Repr::Unattached { .. } => "unattached",
            Repr::Weak { .. } => "weak",
            Repr::Attached(_) => "attached",
        };
        let key = self.primary_key().ok().flatten();
        f.debug_struct("Object")
            .field("type", &self.type_name())
            .field("key", &key)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrordb_schema::Schema;

    fn schema() -> Schema {
        Schema::builder()
            .entity(
                EntityType::builder("Customer")
                    .primary_key("id")
                    .scalar("name")
                    .scalar_list("nicknames")
                    .backlink("orders", "Order", "customer"),
            )
            .entity(
                EntityType::builder("Order")
                    .primary_key("id")
                    .link("customer", "Customer"),
            )
            .build()
            .unwrap()
    }

    fn customer(schema: &Schema) -> Object {
        Object::new(Arc::clone(schema.get("Customer").unwrap()))
    }

    #[test]
    fn unset_properties_read_as_defaults() {
        let schema = schema();
        let c = customer(&schema);

        assert!(matches!(
            c.get("name").unwrap(),
            PropertyValue::Value(Value::Null)
        ));
        assert!(c.get("nicknames").unwrap().as_list().unwrap().is_empty());
        assert_eq!(c.primary_key().unwrap(), None);
    }

    #[test]
    fn set_and_get_scalar() {
        let schema = schema();
        let c = customer(&schema);
        c.set("id", Value::from("c1")).unwrap();
        c.set("name", Value::from("Ada")).unwrap();

        assert_eq!(c.get("name").unwrap().as_value(), Some(&Value::from("Ada")));
        assert_eq!(c.primary_key().unwrap(), Some(Value::from("c1")));
        assert_eq!(c.require_primary_key().unwrap(), Value::from("c1"));
    }

    #[test]
    fn unknown_property_is_reported() {
        let schema = schema();
        let err = customer(&schema).get("missing").unwrap_err();
        assert!(err.is_property_not_found());
    }

    #[test]
    fn backlink_is_read_only_and_empty() {
        let schema = schema();
        let c = customer(&schema);

        assert!(c.get("orders").unwrap().as_list().unwrap().is_empty());
        let err = c.set("orders", Vec::<ListItem>::new()).unwrap_err();
        assert!(matches!(err, StoreError::ReadOnlyProperty { .. }));
    }

    #[test]
    fn link_requires_matching_type() {
        let schema = schema();
        let order = Object::new(Arc::clone(schema.get("Order").unwrap()));
        let other_order = Object::new(Arc::clone(schema.get("Order").unwrap()));

        order.set("customer", customer(&schema)).unwrap();
        let err = order.set("customer", other_order).unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { .. }));

        let err = order.set("customer", Value::from("c1")).unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { .. }));
    }

    #[test]
    fn handles_share_state() {
        let schema = schema();
        let c = customer(&schema);
        let alias = c.clone();
        alias.set("name", Value::from("Grace")).unwrap();

        assert!(c.ptr_eq(&alias));
        assert_eq!(c.get("name").unwrap().as_value(), Some(&Value::from("Grace")));
    }

    #[test]
    fn weak_handle_follows_owner_lifetime() {
        let schema = schema();
        let c = customer(&schema);
        c.set("name", Value::from("Ada")).unwrap();
        let weak = c.downgrade();

        assert!(weak.ptr_eq(&c));
        assert_eq!(weak.get("name").unwrap().as_value(), Some(&Value::from("Ada")));

        drop(c);
        assert!(!weak.is_valid());
        assert!(matches!(
            weak.get("name").unwrap_err(),
            StoreError::ObjectInvalidated { .. }
        ));
    }

    #[test]
    fn anchored_handle_keeps_weak_members_alive() {
        let schema = schema();
        let c = customer(&schema);
        c.set("id", Value::from("c1")).unwrap();
        let order = Object::new(Arc::clone(schema.get("Order").unwrap()));
        order.set("customer", c.downgrade()).unwrap();

        let anchor = GraphAnchor::new();
        anchor.hold(&c);
        anchor.hold(&order);
        let order = order.anchored(&anchor);
        drop(c);
        drop(anchor);

        let owner = order.get("customer").unwrap();
        let owner = owner.as_object().unwrap();
        assert!(owner.is_valid());
        assert_eq!(owner.primary_key().unwrap(), Some(Value::from("c1")));
    }

    #[test]
    fn stored_values_drop_their_anchor() {
        let schema = schema();
        let c = customer(&schema);
        let anchor = GraphAnchor::new();
        anchor.hold(&c);
        let order = Object::new(Arc::clone(schema.get("Order").unwrap()));
        order.set("customer", c.anchored(&anchor)).unwrap();
        drop(c);
        assert_eq!(anchor.len(), 1);

        // The order holds the customer strongly but not the anchor.
        let remaining = anchor.clone();
        drop(anchor);
        assert_eq!(Arc::strong_count(&remaining.members), 1);
        assert!(order.get("customer").unwrap().as_object().unwrap().is_valid());
    }
}
