//! Object store contract.

use crate::error::{StoreError, StoreResult};
use crate::object::Object;
use mirrordb_schema::Schema;
use std::fmt;
use uuid::Uuid;

/// Identity of a store instance.
///
/// Attached objects carry the id of the store they belong to, which is how
/// a store recognises its own objects and rejects foreign ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(Uuid);

impl StoreId {
    /// Creates a new random store id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a store id from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store:{}", self.0)
    }
}

/// A transactional container of entity instances partitioned by type.
pub trait ObjectStore {
    /// Write transaction type handed out by [`begin_write`](Self::begin_write).
    type Transaction<'a>: WriteTransaction
    where
        Self: 'a;

    /// Identity of this store.
    fn store_id(&self) -> StoreId;

    /// Schema the store was opened with.
    fn schema(&self) -> &Schema;

    /// Every committed instance of `type_name`, as attached objects.
    fn all(&self, type_name: &str) -> StoreResult<Vec<Object>>;

    /// Number of committed instances of `type_name`.
    fn count(&self, type_name: &str) -> StoreResult<usize> {
        Ok(self.all(type_name)?.len())
    }

    /// Begins the single write transaction.
    ///
    /// Blocks while another write transaction is open.
    fn begin_write(&self) -> StoreResult<Self::Transaction<'_>>;

    /// Runs `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`; otherwise the transaction is dropped
    /// and nothing becomes visible.
    fn write<'s, F, T, E>(&'s self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Transaction<'s>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = self.begin_write()?;
        let result = f(&mut txn)?;
        txn.commit()?;
        Ok(result)
    }
}

/// An open write transaction. Dropping it without commit rolls back.
pub trait WriteTransaction {
    /// Every instance of `type_name` as seen by this transaction.
    fn all(&self, type_name: &str) -> StoreResult<Vec<Object>>;

    /// Looks up one instance by primary key.
    fn get(&self, type_name: &str, key: &mirrordb_schema::Value) -> StoreResult<Option<Object>>;

    /// Adds an unattached object graph.
    ///
    /// With `update`, an existing record with the same primary key is
    /// replaced as a whole; without it, a collision is an error. Linked
    /// unattached objects are added the same way.
    fn add(&mut self, object: &Object, update: bool) -> StoreResult<()>;

    /// Deletes an attached object. Links pointing at it are cleared.
    fn remove(&mut self, object: &Object) -> StoreResult<()>;

    /// Makes every change visible atomically.
    fn commit(self) -> StoreResult<()>
    where
        Self: Sized;
}
