//! Synchronization engine.
//!
//! A run brings the destination into agreement with the source, type by
//! type, inside one write transaction on the destination:
//!
//! 1. refuse to sync a store into itself or across incompatible schemas
//! 2. refuse when the source has no instances of the guard type
//! 3. compute the write order from the destination's dependency graph
//! 4. per top-level type: clone source instances, delete destination
//!    instances whose key is not among them, upsert the clones
//! 5. commit (or roll back in dry-run mode)
//!
//! Any error drops the transaction and leaves the destination unchanged.

use crate::cloner::Cloner;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::graph::DependencyGraph;
use crate::report::{SyncReport, TypeReport};
use mirrordb_schema::{Schema, Value};
use mirrordb_store::{ObjectStore, WriteTransaction};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Runs full-reconciliation passes from a source store to a destination.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    config: SyncConfig,
}

impl Synchronizer {
    /// Creates a synchronizer.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Makes `destination` hold exactly the source's instances.
    pub fn synchronize<S, D>(&self, source: &S, destination: &D) -> SyncResult<SyncReport>
    where
        S: ObjectStore,
        D: ObjectStore,
    {
        let started = Instant::now();
        info!(
            source = %source.store_id(),
            destination = %destination.store_id(),
            dry_run = self.config.dry_run,
            "starting sync"
        );

        if source.store_id() == destination.store_id() {
            return Err(SyncError::SameStore);
        }
        if self.config.check_schema {
            check_schemas(source.schema(), destination.schema())?;
        }
        if self.config.wipe_guard {
            self.check_wipe_guard(source, destination.schema())?;
        }

        let graph = DependencyGraph::build(destination.schema());
        if graph.has_cycle() {
            warn!("destination schema has a type-level reference cycle; write order is a plain visitation order");
        }
        let write_order = graph.write_order();
        debug!(order = ?write_order, "computed write order");

        let mut txn = destination.begin_write()?;
        let mut report = SyncReport {
            write_order,
            dry_run: self.config.dry_run,
            ..SyncReport::default()
        };

        for type_name in &report.write_order {
            let Some(entity_type) = destination.schema().get(type_name) else {
                continue;
            };
            if entity_type.is_embedded() {
                trace!(type_name = %type_name, "embedded type travels with its owners");
                continue;
            }

            let counts = sync_type(source, destination.schema(), &mut txn, type_name)?;
            debug!(
                type_name = %type_name,
                upserted = counts.upserted,
                removed = counts.removed,
                "synchronized type"
            );
            report.types.push(counts);
        }

        if self.config.dry_run {
            drop(txn);
            info!(
                upserted = report.total_upserted(),
                removed = report.total_removed(),
                "dry run complete, changes rolled back"
            );
        } else {
            txn.commit()?;
        }

        report.duration = started.elapsed();
        info!(
            upserted = report.total_upserted(),
            removed = report.total_removed(),
            duration = ?report.duration,
            "sync finished"
        );
        Ok(report)
    }

    fn check_wipe_guard<S: ObjectStore>(&self, source: &S, destination: &Schema) -> SyncResult<()> {
        let guard = match &self.config.guard_type {
            Some(name) => name.as_str(),
            None => match destination.first_top_level() {
                Some(t) => t.name(),
                None => return Ok(()),
            },
        };

        if source.count(guard)? == 0 {
            warn!(type_name = guard, "source has no instances of the guard type, refusing to sync");
            return Err(SyncError::DestructiveOperation {
                type_name: guard.to_string(),
            });
        }
        Ok(())
    }
}

/// Reconciles one type inside the open transaction.
fn sync_type<S, T>(
    source: &S,
    schema: &Schema,
    txn: &mut T,
    type_name: &str,
) -> SyncResult<TypeReport>
where
    S: ObjectStore,
    T: WriteTransaction,
{
    let instances = source.all(type_name)?;
    let clones = Cloner::new(schema).clone_all(&instances)?;

    let incoming = clones
        .iter()
        .map(|c| c.require_primary_key())
        .collect::<Result<BTreeSet<Value>, _>>()?;

    let mut removed = 0;
    for existing in txn.all(type_name)? {
        let key = existing.require_primary_key()?;
        if !incoming.contains(&key) {
            trace!(type_name, %key, "removing stale instance");
            txn.remove(&existing)?;
            removed += 1;
        }
    }

    for clone in &clones {
        txn.add(clone, true)?;
    }

    Ok(TypeReport {
        type_name: type_name.to_string(),
        upserted: clones.len(),
        removed,
    })
}

/// Every destination type must exist in the source with the same primary key.
fn check_schemas(source: &Schema, destination: &Schema) -> SyncResult<()> {
    for entity_type in destination.types() {
        let name = entity_type.name();
        let Some(other) = source.get(name) else {
            return Err(SyncError::schema_mismatch(name, "type is missing from the source schema"));
        };
        if other.is_embedded() != entity_type.is_embedded() {
            return Err(SyncError::schema_mismatch(name, "embedded in only one schema"));
        }
        let key = entity_type.primary_key().map(|p| p.name());
        let other_key = other.primary_key().map(|p| p.name());
        if key != other_key {
            return Err(SyncError::schema_mismatch(
                name,
                format!(
                    "primary key differs (source {}, destination {})",
                    other_key.unwrap_or("none"),
                    key.unwrap_or("none")
                ),
            ));
        }
    }
    Ok(())
}

/// Synchronizes with the default configuration.
pub fn synchronize<S, D>(source: &S, destination: &D) -> SyncResult<SyncReport>
where
    S: ObjectStore,
    D: ObjectStore,
{
    Synchronizer::default().synchronize(source, destination)
}
