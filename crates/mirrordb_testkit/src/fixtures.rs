//! Test fixtures and store helpers.
//!
//! Provides fixture schemas, object builders and convenience functions for
//! setting up stores in tests.

use mirrordb_schema::{EntityType, Schema, Value};
use mirrordb_store::{
    ListItem, MemoryStore, Object, ObjectStore, StoreConfig, StoreError, WriteTransaction,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A small shop schema.
///
/// - `Customer` (key `id`) embeds an `Address`, links `Tag`s, has an
///   `orders` backlink and inherits `revision` from the internal `Audit` base
/// - `Order` (key `id`) links a `Customer` and embeds `OrderLine`s
/// - `OrderLine` (embedded) links a `Product`
/// - `Product` (key `sku`), `Tag` (key `name`)
pub fn shop_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .internal_base(EntityType::builder("Audit").scalar("revision"))
        .entity(
            EntityType::builder("Customer")
                .primary_key("id")
                .scalar("name")
                .scalar("email")
                .embedded("address", "Address")
                .link_list("tags", "Tag")
                .backlink("orders", "Order", "customer")
                .inherit("Audit"),
        )
        .embedded(
            EntityType::builder("Address")
                .scalar("street")
                .scalar("city"),
        )
        .entity(
            EntityType::builder("Order")
                .primary_key("id")
                .link("customer", "Customer")
                .embedded_list("lines", "OrderLine")
                .scalar_list("notes")
                .scalar("total"),
        )
        .embedded(
            EntityType::builder("OrderLine")
                .link("product", "Product")
                .scalar("quantity"),
        )
        .entity(
            EntityType::builder("Product")
                .primary_key("sku")
                .scalar("name")
                .scalar("price"),
        )
        .entity(EntityType::builder("Tag").primary_key("name"))
        .build()
        .expect("shop schema is valid");
    Arc::new(schema)
}

/// A schema whose types reference each other.
///
/// `Person.best_friend` links `Person`; `Team.captain` and `Team.members`
/// link `Member`, and `Member.team` links back to `Team`.
pub fn cyclic_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .entity(
            EntityType::builder("Person")
                .primary_key("name")
                .link("best_friend", "Person"),
        )
        .entity(
            EntityType::builder("Team")
                .primary_key("name")
                .link("captain", "Member")
                .link_list("members", "Member"),
        )
        .entity(
            EntityType::builder("Member")
                .primary_key("name")
                .scalar("role")
                .link("team", "Team"),
        )
        .build()
        .expect("cyclic schema is valid");
    Arc::new(schema)
}

/// A test store with automatic cleanup of its backing file.
pub struct TestStore {
    /// The store instance.
    pub store: MemoryStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an empty in-memory store.
    pub fn memory(schema: &Arc<Schema>) -> Self {
        Self {
            store: MemoryStore::new(Arc::clone(schema)),
            _temp_dir: None,
        }
    }

    /// Creates an empty store with a file path in a temporary directory.
    ///
    /// Nothing is written until [`MemoryStore::save`] is called.
    pub fn file(schema: &Arc<Schema>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.mirror");
        let store = MemoryStore::open(&path, Arc::clone(schema), StoreConfig::new().name("file"))
            .expect("Failed to open file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the snapshot path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("store.mirror"))
    }
}

impl std::ops::Deref for TestStore {
    type Target = MemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

fn new_object(schema: &Schema, type_name: &str) -> Object {
    let entity_type = schema
        .get(type_name)
        .unwrap_or_else(|| panic!("type {type_name} is not in the schema"));
    Object::new(Arc::clone(entity_type))
}

fn assign(object: &Object, name: &str, value: impl Into<mirrordb_store::PropertyValue>) {
    object
        .set(name, value)
        .unwrap_or_else(|e| panic!("Failed to set {}.{name}: {e}", object.type_name()));
}

/// Builds an unattached `Customer`.
pub fn customer(schema: &Schema, id: i64, name: &str) -> Object {
    let object = new_object(schema, "Customer");
    assign(&object, "id", Value::from(id));
    assign(&object, "name", Value::from(name));
    assign(&object, "email", Value::from(format!("{}@example.com", name.to_lowercase())));
    object
}

/// Builds an unattached `Address`.
pub fn address(schema: &Schema, street: &str, city: &str) -> Object {
    let object = new_object(schema, "Address");
    assign(&object, "street", Value::from(street));
    assign(&object, "city", Value::from(city));
    object
}

/// Builds an unattached `Product`.
pub fn product(schema: &Schema, sku: &str, name: &str, price: i64) -> Object {
    let object = new_object(schema, "Product");
    assign(&object, "sku", Value::from(sku));
    assign(&object, "name", Value::from(name));
    assign(&object, "price", Value::from(price));
    object
}

/// Builds an unattached `Tag`.
pub fn tag(schema: &Schema, name: &str) -> Object {
    let object = new_object(schema, "Tag");
    assign(&object, "name", Value::from(name));
    object
}

/// Builds an unattached `OrderLine`.
pub fn order_line(schema: &Schema, product: &Object, quantity: i64) -> Object {
    let object = new_object(schema, "OrderLine");
    assign(&object, "product", product.clone());
    assign(&object, "quantity", Value::from(quantity));
    object
}

/// Builds an unattached `Order` for `customer` with the given lines.
pub fn order(schema: &Schema, id: i64, customer: &Object, lines: Vec<Object>) -> Object {
    let object = new_object(schema, "Order");
    assign(&object, "id", Value::from(id));
    assign(&object, "customer", customer.clone());
    assign(
        &object,
        "lines",
        lines.into_iter().map(ListItem::Object).collect::<Vec<_>>(),
    );
    assign(&object, "total", Value::from(id * 100));
    object
}

/// Upserts `objects` (and everything they link to) in one transaction.
pub fn put(store: &MemoryStore, objects: &[Object]) {
    store
        .write(|txn| -> Result<(), StoreError> {
            for object in objects {
                txn.add(object, true)?;
            }
            Ok(())
        })
        .expect("Failed to write objects");
    tracing::debug!(count = objects.len(), "fixture objects written");
}

/// Primary keys per top-level type, in key order.
pub fn keys(store: &MemoryStore) -> BTreeMap<String, Vec<Value>> {
    store
        .schema()
        .types()
        .filter(|t| !t.is_embedded())
        .map(|t| {
            let keys = store
                .all(t.name())
                .expect("Failed to enumerate")
                .iter()
                .map(|o| o.require_primary_key().expect("Failed to read key"))
                .collect();
            (t.name().to_string(), keys)
        })
        .collect()
}

/// Reads a scalar property, failing the test if it is not one.
pub fn scalar(object: &Object, name: &str) -> Value {
    object
        .get(name)
        .expect("Failed to read property")
        .as_value()
        .cloned()
        .unwrap_or_else(|| panic!("{}.{name} is not a scalar", object.type_name()))
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A populated shop: two customers, two products, two tags, three orders.
    pub fn populated_shop(schema: &Arc<Schema>) -> TestStore {
        let store = TestStore::memory(schema);

        let red = tag(schema, "red");
        let gold = tag(schema, "gold");
        let ada = customer(schema, 1, "Ada");
        ada.set("address", address(schema, "1 Analytical Way", "London"))
            .expect("Failed to set address");
        ada.set("tags", vec![ListItem::Object(red.clone()), ListItem::Object(gold)])
            .expect("Failed to set tags");
        let grace = customer(schema, 2, "Grace");
        grace
            .set("tags", vec![ListItem::Object(red)])
            .expect("Failed to set tags");

        let lamp = product(schema, "lamp", "Desk lamp", 3500);
        let mug = product(schema, "mug", "Coffee mug", 900);

        let orders = [
            order(schema, 10, &ada, vec![order_line(schema, &lamp, 1), order_line(schema, &mug, 2)]),
            order(schema, 11, &ada, vec![order_line(schema, &mug, 4)]),
            order(schema, 12, &grace, Vec::new()),
        ];
        put(&store, &orders);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shop_schema_shape() {
        let schema = shop_schema();
        assert_eq!(schema.first_top_level().unwrap().name(), "Customer");
        assert!(schema.get("Address").unwrap().is_embedded());
        assert!(!schema.is_user_type("Audit"));
        assert_eq!(
            schema.get("Customer").unwrap().property("revision").unwrap().declared_in(),
            "Audit"
        );
    }

    #[test]
    fn populated_shop_contents() {
        let schema = shop_schema();
        let store = scenarios::populated_shop(&schema);
        let keys = keys(&store);

        assert_eq!(keys["Customer"], vec![Value::from(1), Value::from(2)]);
        assert_eq!(keys["Order"].len(), 3);
        assert_eq!(keys["Product"].len(), 2);
        assert_eq!(keys["Tag"], vec![Value::from("red"), Value::from("gold")]);
    }

    #[test]
    fn file_store_has_path() {
        let schema = shop_schema();
        let store = TestStore::file(&schema);
        let path = store.path().unwrap();
        store.save(&path).unwrap();
        assert!(path.exists());
        assert!(TestStore::memory(&schema).path().is_none());
    }
}
