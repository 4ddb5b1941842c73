//! Stored record layout of the in-memory store.

use mirrordb_schema::{EntityType, PropertyKind, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Property values of one stored record, keyed by property name.
///
/// Embedded objects are stored inline; links are stored as the target's
/// primary key. Backlinks are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Record(pub(crate) BTreeMap<String, Stored>);

/// Stored form of a property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Stored {
    Value(Value),
    Embedded(Option<Record>),
    Link(Option<Value>),
    List(Vec<StoredItem>),
}

/// Stored form of a collection element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum StoredItem {
    Value(Value),
    Embedded(Record),
    Link(Value),
}

/// Records of one entity type, ordered by primary key.
pub(crate) type Table = BTreeMap<Value, Record>;

/// An immutable view of every table.
///
/// Tables are shared between snapshots and copied on first write.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) version: u64,
    pub(crate) tables: BTreeMap<String, Arc<Table>>,
}

impl Snapshot {
    /// An empty snapshot with one table per top-level type.
    pub(crate) fn empty(schema: &Schema) -> Self {
        let tables = schema
            .types()
            .filter(|t| !t.is_embedded())
            .map(|t| (t.name().to_string(), Arc::new(Table::new())))
            .collect();
        Self { version: 0, tables }
    }

    pub(crate) fn table(&self, type_name: &str) -> Option<&Table> {
        self.tables.get(type_name).map(Arc::as_ref)
    }

    pub(crate) fn contains(&self, type_name: &str, key: &Value) -> bool {
        self.table(type_name).is_some_and(|t| t.contains_key(key))
    }
}

/// Returns true if `record` (or anything embedded in it) links to `key` of `target`.
pub(crate) fn references(
    schema: &Schema,
    entity_type: &EntityType,
    record: &Record,
    target: &str,
    key: &Value,
) -> bool {
    entity_type.forward_properties().any(|property| {
        let Some(stored) = record.0.get(property.name()) else {
            return false;
        };
        let links_target = property.object_type() == Some(target);
        match stored {
            Stored::Link(Some(k)) => links_target && k == key,
            Stored::List(items) if property.kind() == PropertyKind::LinkList => {
                links_target && items.iter().any(|i| matches!(i, StoredItem::Link(k) if k == key))
            }
            Stored::Embedded(Some(inner)) => embedded_type(schema, property.object_type())
                .is_some_and(|t| references(schema, t, inner, target, key)),
            Stored::List(items) if property.kind() == PropertyKind::EmbeddedList => {
                embedded_type(schema, property.object_type()).is_some_and(|t| {
                    items.iter().any(|i| match i {
                        StoredItem::Embedded(inner) => references(schema, t, inner, target, key),
                        _ => false,
                    })
                })
            }
            _ => false,
        }
    })
}

/// Clears every link from `record` to `key` of `target`.
pub(crate) fn unlink(
    schema: &Schema,
    entity_type: &EntityType,
    record: &mut Record,
    target: &str,
    key: &Value,
) {
    for property in entity_type.forward_properties() {
        let Some(stored) = record.0.get_mut(property.name()) else {
            continue;
        };
        let links_target = property.object_type() == Some(target);
        match stored {
            Stored::Link(link) if links_target && link.as_ref() == Some(key) => {
                *link = None;
            }
            Stored::List(items) if links_target && property.kind() == PropertyKind::LinkList => {
                items.retain(|i| !matches!(i, StoredItem::Link(k) if k == key));
            }
            Stored::Embedded(Some(inner)) => {
                if let Some(t) = embedded_type(schema, property.object_type()) {
                    unlink(schema, t, inner, target, key);
                }
            }
            Stored::List(items) if property.kind() == PropertyKind::EmbeddedList => {
                if let Some(t) = embedded_type(schema, property.object_type()) {
                    for item in items.iter_mut() {
                        if let StoredItem::Embedded(inner) = item {
                            unlink(schema, t, inner, target, key);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn embedded_type<'s>(schema: &'s Schema, name: Option<&str>) -> Option<&'s EntityType> {
    name.and_then(|n| schema.get(n)).map(Arc::as_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::builder()
            .entity(EntityType::builder("Product").primary_key("sku"))
            .embedded(EntityType::builder("Line").link("product", "Product"))
            .entity(
                EntityType::builder("Order")
                    .primary_key("id")
                    .link("featured", "Product")
                    .link_list("extras", "Product")
                    .embedded_list("lines", "Line"),
            )
            .build()
            .unwrap()
    }

    fn order_record() -> Record {
        let mut line = Record::default();
        line.0
            .insert("product".into(), Stored::Link(Some(Value::from("p1"))));

        let mut order = Record::default();
        order.0.insert("id".into(), Stored::Value(Value::from(1)));
        order
            .0
            .insert("featured".into(), Stored::Link(Some(Value::from("p1"))));
        order.0.insert(
            "extras".into(),
            Stored::List(vec![
                StoredItem::Link(Value::from("p1")),
                StoredItem::Link(Value::from("p2")),
            ]),
        );
        order
            .0
            .insert("lines".into(), Stored::List(vec![StoredItem::Embedded(line)]));
        order
    }

    #[test]
    fn detects_direct_and_nested_references() {
        let schema = schema();
        let order_type = schema.get("Order").unwrap();
        let record = order_record();

        assert!(references(&schema, order_type, &record, "Product", &Value::from("p1")));
        assert!(references(&schema, order_type, &record, "Product", &Value::from("p2")));
        assert!(!references(&schema, order_type, &record, "Product", &Value::from("p3")));
        assert!(!references(&schema, order_type, &record, "Order", &Value::from("p1")));
    }

    #[test]
    fn unlink_clears_every_occurrence() {
        let schema = schema();
        let order_type = schema.get("Order").unwrap();
        let mut record = order_record();

        unlink(&schema, order_type, &mut record, "Product", &Value::from("p1"));

        assert_eq!(record.0["featured"], Stored::Link(None));
        assert_eq!(
            record.0["extras"],
            Stored::List(vec![StoredItem::Link(Value::from("p2"))])
        );
        assert!(!references(&schema, order_type, &record, "Product", &Value::from("p1")));
        assert!(references(&schema, order_type, &record, "Product", &Value::from("p2")));
    }

    #[test]
    fn empty_snapshot_has_top_level_tables_only() {
        let snapshot = Snapshot::empty(&schema());
        assert!(snapshot.table("Order").is_some());
        assert!(snapshot.table("Product").is_some());
        assert!(snapshot.table("Line").is_none());
    }
}
