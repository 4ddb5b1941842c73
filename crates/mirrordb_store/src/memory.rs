//! In-memory object store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::{ListItem, LiveObject, Object, PropertyValue};
use crate::record::{self, Record, Snapshot, Stored, StoredItem, Table};
use crate::snapshot;
use crate::store::{ObjectStore, StoreId, WriteTransaction};
use mirrordb_schema::{EntityType, Property, PropertyKind, Schema, Value};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct Shared {
    id: StoreId,
    schema: Arc<Schema>,
    config: StoreConfig,
    committed: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    /// Id of the open write transaction, if any.
    open_txn: Mutex<Option<u64>>,
    txn_ids: AtomicU64,
}

/// A transactional in-memory object store.
///
/// Readers work on an immutable snapshot; a single writer prepares the
/// next snapshot and publishes it on commit. Cloning the store clones the
/// handle, not the data.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mirrordb_schema::{EntityType, Schema, Value};
/// use mirrordb_store::{MemoryStore, Object, ObjectStore, StoreError, WriteTransaction};
///
/// let schema = Arc::new(
///     Schema::builder()
///         .entity(EntityType::builder("Tag").primary_key("name"))
///         .build()
///         .unwrap(),
/// );
/// let store = MemoryStore::new(Arc::clone(&schema));
///
/// let tag = Object::new(Arc::clone(schema.get("Tag").unwrap()));
/// tag.set("name", Value::from("red")).unwrap();
///
/// store
///     .write(|txn| -> Result<(), StoreError> { txn.add(&tag, true) })
///     .unwrap();
/// assert_eq!(store.count("Tag").unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates an empty store with default configuration.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, StoreConfig::default())
    }

    /// Creates an empty store.
    #[must_use]
    pub fn with_config(schema: Arc<Schema>, config: StoreConfig) -> Self {
        let snapshot = Snapshot::empty(&schema);
        Self::from_parts(schema, config, snapshot)
    }

    fn from_parts(schema: Arc<Schema>, config: StoreConfig, snapshot: Snapshot) -> Self {
        let id = StoreId::new();
        debug!(store = %config.name, %id, types = schema.len(), "opened memory store");
        Self {
            shared: Arc::new(Shared {
                id,
                schema,
                config,
                committed: RwLock::new(Arc::new(snapshot)),
                writer: Mutex::new(()),
                open_txn: Mutex::new(None),
                txn_ids: AtomicU64::new(0),
            }),
        }
    }

    /// Restores a store from a snapshot image.
    pub fn from_snapshot_bytes(
        schema: Arc<Schema>,
        config: StoreConfig,
        bytes: &[u8],
    ) -> StoreResult<Self> {
        let snapshot = snapshot::decode(bytes, &schema)?;
        Ok(Self::from_parts(schema, config, snapshot))
    }

    /// Encodes the committed state as a snapshot image.
    pub fn snapshot_bytes(&self) -> StoreResult<Vec<u8>> {
        snapshot::encode(&self.committed())
    }

    /// Opens a store persisted with [`save`](Self::save).
    ///
    /// A missing file yields an empty store unless
    /// `config.create_if_missing` is false.
    pub fn open(path: &Path, schema: Arc<Schema>, config: StoreConfig) -> StoreResult<Self> {
        match fs::read(path) {
            Ok(bytes) => Self::from_snapshot_bytes(schema, config, &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && config.create_if_missing => {
                Ok(Self::with_config(schema, config))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the committed state to `path`.
    ///
    /// The image is written next to `path` first and renamed into place.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let bytes = self.snapshot_bytes()?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        debug!(store = %self.shared.config.name, path = %path.display(), bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    /// Looks up a committed instance by primary key.
    pub fn get(&self, type_name: &str, key: &Value) -> StoreResult<Option<Object>> {
        let snapshot = self.committed();
        lookup(&self.shared, &snapshot, None, type_name, key)
    }

    /// Version of the committed state. Incremented by every commit.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.committed().version
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// A shared handle to the schema.
    #[must_use]
    pub fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.shared.schema)
    }

    fn committed(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.shared.committed.read())
    }
}

impl ObjectStore for MemoryStore {
    type Transaction<'a> = MemoryTransaction<'a>
    where
        Self: 'a;

    fn store_id(&self) -> StoreId {
        self.shared.id
    }

    fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    fn all(&self, type_name: &str) -> StoreResult<Vec<Object>> {
        let snapshot = self.committed();
        enumerate(&self.shared, &snapshot, None, type_name)
    }

    fn count(&self, type_name: &str) -> StoreResult<usize> {
        top_level_type(&self.shared.schema, type_name)?;
        Ok(self.committed().table(type_name).map_or(0, Table::len))
    }

    fn begin_write(&self) -> StoreResult<MemoryTransaction<'_>> {
        if self.shared.config.read_only {
            return Err(StoreError::ReadOnlyStore {
                name: self.shared.config.name.clone(),
            });
        }
        let guard = self.shared.writer.lock();
        let id = self.shared.txn_ids.fetch_add(1, Ordering::Relaxed) + 1;
        *self.shared.open_txn.lock() = Some(id);
        let mut working = (*self.committed()).clone();
        working.version += 1;
        trace!(store = %self.shared.config.name, version = working.version, txn = id, "began write transaction");

        Ok(MemoryTransaction {
            shared: &self.shared,
            _writer: guard,
            id,
            working,
            committed: false,
            added: 0,
            removed: 0,
        })
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("id", &self.shared.id)
            .field("name", &self.shared.config.name)
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

/// Write transaction of a [`MemoryStore`].
///
/// Holds the store's writer lock until committed or dropped.
pub struct MemoryTransaction<'a> {
    shared: &'a Arc<Shared>,
    _writer: MutexGuard<'a, ()>,
    id: u64,
    working: Snapshot,
    committed: bool,
    added: usize,
    removed: usize,
}

impl MemoryTransaction<'_> {
    fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    fn table_mut(&mut self, type_name: &str) -> &mut Table {
        Arc::make_mut(self.working.tables.entry(type_name.to_string()).or_default())
    }

    /// Writes an unattached object and everything it links to; returns its key.
    fn write_object(
        &mut self,
        object: &Object,
        update: bool,
        visited: &mut HashSet<(String, Value)>,
    ) -> StoreResult<Value> {
        let entity_type = Arc::clone(top_level_type(self.schema(), object.type_name())?);

        if let Some(id) = object.store_id() {
            if id != self.shared.id {
                return Err(StoreError::ForeignObject {
                    type_name: entity_type.name().to_string(),
                });
            }
            return object.require_primary_key();
        }

        let key = object.require_primary_key()?;
        if !visited.insert((entity_type.name().to_string(), key.clone())) {
            return Ok(key);
        }
        if !update && self.working.contains(entity_type.name(), &key) {
            return Err(StoreError::DuplicatePrimaryKey {
                type_name: entity_type.name().to_string(),
                key,
            });
        }

        let record = self.build_record(&entity_type, object, update, visited)?;
        self.table_mut(entity_type.name()).insert(key.clone(), record);
        self.added += 1;
        trace!(type_name = entity_type.name(), %key, "staged upsert");
        Ok(key)
    }

    fn build_record(
        &mut self,
        entity_type: &EntityType,
        object: &Object,
        update: bool,
        visited: &mut HashSet<(String, Value)>,
    ) -> StoreResult<Record> {
        let mut record = Record::default();
        for property in entity_type.forward_properties() {
            let value = match object.get(property.name()) {
                Ok(value) => value,
                Err(e) if e.is_property_not_found() => continue,
                Err(e) => return Err(e),
            };
            let stored = self.store_value(entity_type, property, value, update, visited)?;
            record.0.insert(property.name().to_string(), stored);
        }
        Ok(record)
    }

    fn store_value(
        &mut self,
        owner: &EntityType,
        property: &Property,
        value: PropertyValue,
        update: bool,
        visited: &mut HashSet<(String, Value)>,
    ) -> StoreResult<Stored> {
        let mismatch = |actual: String| {
            StoreError::kind_mismatch(owner.name(), property.name(), property.kind(), actual)
        };

        let stored = match (property.kind(), value) {
            (PropertyKind::Scalar, PropertyValue::Value(v)) => Stored::Value(v),
            (PropertyKind::Embedded, PropertyValue::Object(o)) => match o {
                Some(o) => Stored::Embedded(Some(self.embedded_record(property, &o, update, visited)?)),
                None => Stored::Embedded(None),
            },
            (PropertyKind::Link, PropertyValue::Object(o)) => match o {
                Some(o) => Stored::Link(Some(self.link_key(property, &o, update, visited)?)),
                None => Stored::Link(None),
            },
            (kind, PropertyValue::List(items)) if kind.is_collection() => {
                let mut stored = Vec::with_capacity(items.len());
                for item in items {
                    let element = match (kind, item) {
                        (PropertyKind::ScalarList, ListItem::Value(v)) => StoredItem::Value(v),
                        (PropertyKind::EmbeddedList, ListItem::Object(o)) => {
                            StoredItem::Embedded(self.embedded_record(property, &o, update, visited)?)
                        }
                        (PropertyKind::LinkList, ListItem::Object(o)) => {
                            StoredItem::Link(self.link_key(property, &o, update, visited)?)
                        }
                        (_, ListItem::Value(v)) => {
                            return Err(mismatch(format!("{} element", v.type_name())))
                        }
                        (_, ListItem::Object(o)) => {
                            return Err(mismatch(format!("{} element", o.type_name())))
                        }
                    };
                    stored.push(element);
                }
                Stored::List(stored)
            }
            (_, other) => return Err(mismatch(other.describe())),
        };
        Ok(stored)
    }

    fn check_target(property: &Property, object: &Object) -> StoreResult<()> {
        if property.object_type() == Some(object.type_name()) {
            Ok(())
        } else {
            Err(StoreError::kind_mismatch(
                property.declared_in(),
                property.name(),
                property.kind(),
                format!("object {}", object.type_name()),
            ))
        }
    }

    fn embedded_record(
        &mut self,
        property: &Property,
        object: &Object,
        update: bool,
        visited: &mut HashSet<(String, Value)>,
    ) -> StoreResult<Record> {
        Self::check_target(property, object)?;
        let entity_type = self
            .schema()
            .get(object.type_name())
            .cloned()
            .ok_or_else(|| StoreError::type_not_found(object.type_name()))?;
        self.build_record(&entity_type, object, update, visited)
    }

    fn link_key(
        &mut self,
        property: &Property,
        object: &Object,
        update: bool,
        visited: &mut HashSet<(String, Value)>,
    ) -> StoreResult<Value> {
        Self::check_target(property, object)?;
        self.write_object(object, update, visited)
    }

    /// Clears links to a removed record in every table.
    fn unlink_all(&mut self, target: &str, key: &Value) {
        let schema = Arc::clone(&self.shared.schema);
        for entity_type in schema.types().filter(|t| !t.is_embedded()) {
            let Some(table) = self.working.table(entity_type.name()) else {
                continue;
            };
            let affected: Vec<Value> = table
                .iter()
                .filter(|(_, r)| record::references(&schema, entity_type, r, target, key))
                .map(|(k, _)| k.clone())
                .collect();
            if affected.is_empty() {
                continue;
            }

            trace!(type_name = entity_type.name(), count = affected.len(), "clearing links to removed record");
            let table = self.table_mut(entity_type.name());
            for k in affected {
                if let Some(r) = table.get_mut(&k) {
                    record::unlink(&schema, entity_type, r, target, key);
                }
            }
        }
    }
}

impl WriteTransaction for MemoryTransaction<'_> {
    fn all(&self, type_name: &str) -> StoreResult<Vec<Object>> {
        let snapshot = Arc::new(self.working.clone());
        enumerate(self.shared, &snapshot, Some(self.id), type_name)
    }

    fn get(&self, type_name: &str, key: &Value) -> StoreResult<Option<Object>> {
        let snapshot = Arc::new(self.working.clone());
        lookup(self.shared, &snapshot, Some(self.id), type_name, key)
    }

    fn add(&mut self, object: &Object, update: bool) -> StoreResult<()> {
        let mut visited = HashSet::new();
        self.write_object(object, update, &mut visited)?;
        Ok(())
    }

    fn remove(&mut self, object: &Object) -> StoreResult<()> {
        let entity_type = Arc::clone(top_level_type(self.schema(), object.type_name())?);
        let type_name = entity_type.name();

        match object.store_id() {
            Some(id) if id == self.shared.id => {}
            Some(_) => {
                return Err(StoreError::ForeignObject {
                    type_name: type_name.to_string(),
                })
            }
            None => {
                return Err(StoreError::ObjectInvalidated {
                    type_name: type_name.to_string(),
                })
            }
        }

        let key = object.require_primary_key()?;
        if self.table_mut(type_name).remove(&key).is_none() {
            return Err(StoreError::ObjectInvalidated {
                type_name: type_name.to_string(),
            });
        }
        self.removed += 1;
        trace!(type_name, %key, "staged remove");

        self.unlink_all(type_name, &key);
        Ok(())
    }

    fn commit(mut self) -> StoreResult<()> {
        let snapshot = std::mem::take(&mut self.working);
        let version = snapshot.version;
        *self.shared.committed.write() = Arc::new(snapshot);
        self.committed = true;

        debug!(
            store = %self.shared.config.name,
            version,
            added = self.added,
            removed = self.removed,
            "committed write transaction"
        );
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        *self.shared.open_txn.lock() = None;
        if !self.committed {
            debug!(
                store = %self.shared.config.name,
                discarded_adds = self.added,
                discarded_removes = self.removed,
                "rolled back write transaction"
            );
        }
    }
}

impl fmt::Debug for MemoryTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("store", &self.shared.id)
            .field("version", &self.working.version)
            .field("added", &self.added)
            .field("removed", &self.removed)
            .finish_non_exhaustive()
    }
}

fn top_level_type<'s>(schema: &'s Schema, type_name: &str) -> StoreResult<&'s Arc<EntityType>> {
    let entity_type = schema
        .get(type_name)
        .ok_or_else(|| StoreError::type_not_found(type_name))?;
    if entity_type.is_embedded() {
        return Err(StoreError::EmbeddedObject {
            type_name: type_name.to_string(),
        });
    }
    Ok(entity_type)
}

fn enumerate(
    shared: &Arc<Shared>,
    snapshot: &Arc<Snapshot>,
    txn: Option<u64>,
    type_name: &str,
) -> StoreResult<Vec<Object>> {
    let entity_type = top_level_type(&shared.schema, type_name)?;
    let Some(table) = snapshot.table(type_name) else {
        return Ok(Vec::new());
    };
    Ok(table
        .keys()
        .map(|key| LiveRecord::top(shared, snapshot, txn, entity_type, key.clone()))
        .collect())
}

fn lookup(
    shared: &Arc<Shared>,
    snapshot: &Arc<Snapshot>,
    txn: Option<u64>,
    type_name: &str,
    key: &Value,
) -> StoreResult<Option<Object>> {
    let entity_type = top_level_type(&shared.schema, type_name)?;
    Ok(snapshot
        .contains(type_name, key)
        .then(|| LiveRecord::top(shared, snapshot, txn, entity_type, key.clone())))
}

#[derive(Debug)]
enum Location {
    Top(Value),
    Embedded { owner: (String, Value), record: Record },
}

/// A record as seen from one pinned snapshot.
#[derive(Debug)]
struct LiveRecord {
    store: Weak<Shared>,
    store_id: StoreId,
    schema: Arc<Schema>,
    snapshot: Arc<Snapshot>,
    /// Transaction that pinned `snapshot`; `None` for committed reads.
    txn: Option<u64>,
    entity_type: Arc<EntityType>,
    location: Location,
}

impl LiveRecord {
    fn top(
        shared: &Arc<Shared>,
        snapshot: &Arc<Snapshot>,
        txn: Option<u64>,
        entity_type: &Arc<EntityType>,
        key: Value,
    ) -> Object {
        Object::attached(Arc::new(LiveRecord {
            store: Arc::downgrade(shared),
            store_id: shared.id,
            schema: Arc::clone(&shared.schema),
            snapshot: Arc::clone(snapshot),
            txn,
            entity_type: Arc::clone(entity_type),
            location: Location::Top(key),
        }))
    }

    fn sibling(&self, entity_type: Arc<EntityType>, location: Location) -> Object {
        Object::attached(Arc::new(LiveRecord {
            store: Weak::clone(&self.store),
            store_id: self.store_id,
            schema: Arc::clone(&self.schema),
            snapshot: Arc::clone(&self.snapshot),
            txn: self.txn,
            entity_type,
            location,
        }))
    }

    fn owner(&self) -> (String, Value) {
        match &self.location {
            Location::Top(key) => (self.entity_type.name().to_string(), key.clone()),
            Location::Embedded { owner, .. } => owner.clone(),
        }
    }

    fn record(&self) -> Option<&Record> {
        match &self.location {
            Location::Top(key) => self
                .snapshot
                .table(self.entity_type.name())
                .and_then(|t| t.get(key)),
            Location::Embedded { record, .. } => Some(record),
        }
    }

    fn target_type(&self, property: &Property) -> StoreResult<Arc<EntityType>> {
        let name = property.object_type().unwrap_or_default();
        self.schema
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::type_not_found(name))
    }

    fn embedded(&self, entity_type: &Arc<EntityType>, record: &Record) -> Object {
        self.sibling(
            Arc::clone(entity_type),
            Location::Embedded {
                owner: self.owner(),
                record: record.clone(),
            },
        )
    }

    /// Resolves a link; a key that no longer exists reads as null.
    fn linked(&self, entity_type: &Arc<EntityType>, key: &Value) -> Option<Object> {
        self.snapshot
            .contains(entity_type.name(), key)
            .then(|| self.sibling(Arc::clone(entity_type), Location::Top(key.clone())))
    }

    fn materialize(&self, property: &Property, stored: &Stored) -> StoreResult<PropertyValue> {
        let value = match stored {
            Stored::Value(v) => PropertyValue::Value(v.clone()),
            Stored::Embedded(None) | Stored::Link(None) => PropertyValue::Object(None),
            Stored::Embedded(Some(record)) => {
                let target = self.target_type(property)?;
                PropertyValue::Object(Some(self.embedded(&target, record)))
            }
            Stored::Link(Some(key)) => {
                let target = self.target_type(property)?;
                PropertyValue::Object(self.linked(&target, key))
            }
            Stored::List(items) => {
                let target = match property.kind() {
                    PropertyKind::ScalarList => None,
                    _ => Some(self.target_type(property)?),
                };
                let items = items
                    .iter()
                    .filter_map(|item| match (item, &target) {
                        (StoredItem::Value(v), _) => Some(ListItem::Value(v.clone())),
                        (StoredItem::Embedded(record), Some(t)) => {
                            Some(ListItem::Object(self.embedded(t, record)))
                        }
                        (StoredItem::Link(key), Some(t)) => self.linked(t, key).map(ListItem::Object),
                        (_, None) => None,
                    })
                    .collect();
                PropertyValue::List(items)
            }
        };
        Ok(value)
    }

    fn backlinks(&self, property: &Property) -> StoreResult<PropertyValue> {
        let Location::Top(key) = &self.location else {
            return Ok(PropertyValue::List(Vec::new()));
        };
        let origin_type = self.target_type(property)?;
        let origin = property.backlink_origin().unwrap_or_default();

        let items = self
            .snapshot
            .table(origin_type.name())
            .into_iter()
            .flat_map(|table| table.iter())
            .filter(|(_, record)| match record.0.get(origin) {
                Some(Stored::Link(Some(k))) => k == key,
                Some(Stored::List(items)) => items
                    .iter()
                    .any(|i| matches!(i, StoredItem::Link(k) if k == key)),
                _ => false,
            })
            .map(|(origin_key, _)| {
                ListItem::Object(self.sibling(Arc::clone(&origin_type), Location::Top(origin_key.clone())))
            })
            .collect();
        Ok(PropertyValue::List(items))
    }
}

impl LiveObject for LiveRecord {
    fn store_id(&self) -> StoreId {
        self.store_id
    }

    fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    fn get(&self, property: &Property) -> StoreResult<PropertyValue> {
        if property.is_backlink() {
            return self.backlinks(property);
        }
        let record = self.record().ok_or_else(|| StoreError::ObjectInvalidated {
            type_name: self.entity_type.name().to_string(),
        })?;
        match record.0.get(property.name()) {
            Some(stored) => self.materialize(property, stored),
            None => Ok(PropertyValue::default_for(property.kind())),
        }
    }

    fn primary_key(&self) -> Option<Value> {
        match &self.location {
            Location::Top(key) => Some(key.clone()),
            Location::Embedded { .. } => None,
        }
    }

    fn is_valid(&self) -> bool {
        let Some(shared) = self.store.upgrade() else {
            return false;
        };
        let (owner_type, owner_key) = self.owner();
        // Objects handed out by a transaction are judged against it while it
        // is open, and against the committed state once it has ended.
        if self.txn.is_some() && *shared.open_txn.lock() == self.txn {
            return self.snapshot.contains(&owner_type, &owner_key);
        }
        let current = Arc::clone(&*shared.committed.read());
        current.contains(&owner_type, &owner_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .entity(
                    EntityType::builder("Customer")
                        .primary_key("id")
                        .scalar("name")
                        .embedded("address", "Address")
                        .backlink("orders", "Order", "customer"),
                )
                .embedded(EntityType::builder("Address").scalar("city"))
                .entity(
                    EntityType::builder("Order")
                        .primary_key("id")
                        .scalar("total")
                        .link("customer", "Customer")
                        .scalar_list("notes"),
                )
                .build()
                .unwrap(),
        )
    }

    fn customer(schema: &Schema, id: &str, name: &str) -> Object {
        let c = Object::new(Arc::clone(schema.get("Customer").unwrap()));
        c.set("id", Value::from(id)).unwrap();
        c.set("name", Value::from(name)).unwrap();
        c
    }

    fn order(schema: &Schema, id: i64, customer: Option<Object>) -> Object {
        let o = Object::new(Arc::clone(schema.get("Order").unwrap()));
        o.set("id", Value::from(id)).unwrap();
        o.set("total", Value::from(id * 10)).unwrap();
        o.set("customer", customer).unwrap();
        o
    }

    fn add_all(store: &MemoryStore, objects: &[Object]) {
        store
            .write(|txn| -> StoreResult<()> {
                for object in objects {
                    txn.add(object, true)?;
                }
                Ok(())
            })
            .unwrap();
    }

    fn name_of(object: &Object) -> Value {
        object.get("name").unwrap().as_value().cloned().unwrap()
    }

    #[test]
    fn add_and_enumerate() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        add_all(&store, &[customer(&schema, "c1", "Ada"), customer(&schema, "c2", "Bob")]);

        let all = store.all("Customer").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(Object::is_attached));
        assert_eq!(all[0].store_id(), Some(store.store_id()));
        assert_eq!(name_of(&all[0]), Value::from("Ada"));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn upsert_replaces_whole_record() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let first = customer(&schema, "c1", "Ada");
        let address = Object::new(Arc::clone(schema.get("Address").unwrap()));
        address.set("city", Value::from("London")).unwrap();
        first.set("address", address).unwrap();
        add_all(&store, &[first]);

        add_all(&store, &[customer(&schema, "c1", "Ada Lovelace")]);

        let c = store.get("Customer", &Value::from("c1")).unwrap().unwrap();
        assert_eq!(name_of(&c), Value::from("Ada Lovelace"));
        assert!(c.get("address").unwrap().as_object().is_none());
        assert_eq!(store.count("Customer").unwrap(), 1);
    }

    #[test]
    fn insert_without_update_rejects_duplicates() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        add_all(&store, &[customer(&schema, "c1", "Ada")]);

        let result = store.write(|txn| txn.add(&customer(&schema, "c1", "Eve"), false));
        assert!(matches!(result, Err(StoreError::DuplicatePrimaryKey { .. })));
        assert_eq!(
            name_of(&store.get("Customer", &Value::from("c1")).unwrap().unwrap()),
            Value::from("Ada")
        );
    }

    #[test]
    fn adding_a_graph_adds_linked_objects() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let c = customer(&schema, "c1", "Ada");
        add_all(&store, &[order(&schema, 1, Some(c))]);

        assert_eq!(store.count("Customer").unwrap(), 1);
        let o = store.get("Order", &Value::from(1)).unwrap().unwrap();
        let linked = o.get("customer").unwrap();
        assert_eq!(
            linked.as_object().unwrap().primary_key().unwrap(),
            Some(Value::from("c1"))
        );
    }

    #[test]
    fn embedded_objects_are_stored_inline() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let c = customer(&schema, "c1", "Ada");
        let address = Object::new(Arc::clone(schema.get("Address").unwrap()));
        address.set("city", Value::from("London")).unwrap();
        c.set("address", address).unwrap();
        add_all(&store, &[c]);

        let stored = store.get("Customer", &Value::from("c1")).unwrap().unwrap();
        let address = stored.get("address").unwrap();
        let address = address.as_object().unwrap();
        assert!(address.is_attached());
        assert_eq!(address.primary_key().unwrap(), None);
        assert_eq!(
            address.get("city").unwrap().as_value(),
            Some(&Value::from("London"))
        );
        assert!(matches!(
            store.all("Address"),
            Err(StoreError::EmbeddedObject { .. })
        ));
    }

    #[test]
    fn backlinks_are_computed() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let c = customer(&schema, "c1", "Ada");
        add_all(
            &store,
            &[order(&schema, 1, Some(c.clone())), order(&schema, 2, Some(c)), order(&schema, 3, None)],
        );

        let stored = store.get("Customer", &Value::from("c1")).unwrap().unwrap();
        let orders = stored.get("orders").unwrap();
        let keys: Vec<_> = orders
            .as_list()
            .unwrap()
            .iter()
            .map(|i| i.as_object().unwrap().primary_key().unwrap().unwrap())
            .collect();
        assert_eq!(keys, vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn remove_clears_links() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        add_all(&store, &[order(&schema, 1, Some(customer(&schema, "c1", "Ada")))]);

        let c = store.get("Customer", &Value::from("c1")).unwrap().unwrap();
        store.write(|txn| txn.remove(&c)).unwrap();

        assert!(!c.is_valid());
        assert_eq!(store.count("Customer").unwrap(), 0);
        let o = store.get("Order", &Value::from(1)).unwrap().unwrap();
        assert!(o.get("customer").unwrap().as_object().is_none());
    }

    #[test]
    fn remove_rejects_unattached_and_foreign_objects() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let other = MemoryStore::new(Arc::clone(&schema));
        add_all(&other, &[customer(&schema, "c1", "Ada")]);
        let foreign = other.get("Customer", &Value::from("c1")).unwrap().unwrap();

        let result = store.write(|txn| txn.remove(&customer(&schema, "c1", "Ada")));
        assert!(matches!(result, Err(StoreError::ObjectInvalidated { .. })));

        let result = store.write(|txn| txn.remove(&foreign));
        assert!(matches!(result, Err(StoreError::ForeignObject { .. })));

        let result = store.write(|txn| txn.add(&foreign, true));
        assert!(matches!(result, Err(StoreError::ForeignObject { .. })));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let before = store.snapshot_bytes().unwrap();

        let result: StoreResult<()> = store.write(|txn| {
            txn.add(&customer(&schema, "c1", "Ada"), true)?;
            Err(StoreError::type_not_found("Nope"))
        });

        assert!(result.is_err());
        assert_eq!(store.count("Customer").unwrap(), 0);
        assert_eq!(store.snapshot_bytes().unwrap(), before);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn transaction_sees_its_own_writes() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));

        let mut txn = store.begin_write().unwrap();
        txn.add(&customer(&schema, "c1", "Ada"), true).unwrap();
        let pending = txn.all("Customer").unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_valid());
        assert_eq!(store.count("Customer").unwrap(), 0);

        txn.commit().unwrap();
        assert_eq!(store.count("Customer").unwrap(), 1);
        assert!(pending[0].is_valid());
    }

    #[test]
    fn rolled_back_records_are_invalid() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));

        let mut txn = store.begin_write().unwrap();
        txn.add(&customer(&schema, "c1", "Ada"), true).unwrap();
        let pending = txn.get("Customer", &Value::from("c1")).unwrap().unwrap();
        assert!(pending.is_valid());
        drop(txn);

        assert!(!pending.is_valid());
        assert_eq!(store.count("Customer").unwrap(), 0);

        // A later transaction at the same version does not revive it.
        let next = store.begin_write().unwrap();
        assert!(!pending.is_valid());
        drop(next);
    }

    #[test]
    fn list_elements_must_match_kind() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let o = order(&schema, 1, None);
        o.set("notes", vec![ListItem::Object(customer(&schema, "c1", "Ada"))])
            .unwrap();

        let result = store.write(|txn| txn.add(&o, true));
        assert!(matches!(result, Err(StoreError::KindMismatch { .. })));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        let c = Object::new(Arc::clone(schema.get("Customer").unwrap()));

        let result = store.write(|txn| txn.add(&c, true));
        assert!(matches!(result, Err(StoreError::MissingPrimaryKey { .. })));
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let schema = schema();
        let store = MemoryStore::with_config(schema, StoreConfig::new().read_only(true));
        assert!(matches!(
            store.begin_write(),
            Err(StoreError::ReadOnlyStore { .. })
        ));
    }

    #[test]
    fn snapshot_bytes_restore_contents() {
        let schema = schema();
        let store = MemoryStore::new(Arc::clone(&schema));
        add_all(&store, &[order(&schema, 1, Some(customer(&schema, "c1", "Ada")))]);

        let bytes = store.snapshot_bytes().unwrap();
        let restored =
            MemoryStore::from_snapshot_bytes(Arc::clone(&schema), StoreConfig::default(), &bytes)
                .unwrap();

        assert_ne!(restored.store_id(), store.store_id());
        assert_eq!(restored.snapshot_bytes().unwrap(), bytes);
        assert_eq!(restored.count("Order").unwrap(), 1);
    }

    #[test]
    fn save_and_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.mirror");
        let schema = schema();

        let store = MemoryStore::new(Arc::clone(&schema));
        add_all(&store, &[customer(&schema, "c1", "Ada")]);
        store.save(&path).unwrap();

        let reopened = MemoryStore::open(&path, Arc::clone(&schema), StoreConfig::default()).unwrap();
        assert_eq!(reopened.count("Customer").unwrap(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mirror");
        let schema = schema();

        let store = MemoryStore::open(&path, Arc::clone(&schema), StoreConfig::default()).unwrap();
        assert_eq!(store.count("Customer").unwrap(), 0);

        let result = MemoryStore::open(&path, schema, StoreConfig::new().create_if_missing(false));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
