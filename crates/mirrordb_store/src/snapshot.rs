//! Snapshot image codec.
//!
//! A committed snapshot is written as CBOR. Tables and records are
//! emitted in key order, so two stores with the same contents produce the
//! same bytes.

use crate::error::{StoreError, StoreResult};
use crate::record::{Snapshot, Table};
use mirrordb_schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Current image format version.
pub(crate) const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct ImageRef<'a> {
    format: u16,
    tables: BTreeMap<&'a str, &'a Table>,
}

#[derive(Deserialize)]
struct Image {
    format: u16,
    tables: BTreeMap<String, Table>,
}

/// Encodes a snapshot. The version counter is not part of the image.
pub(crate) fn encode(snapshot: &Snapshot) -> StoreResult<Vec<u8>> {
    let image = ImageRef {
        format: FORMAT_VERSION,
        tables: snapshot
            .tables
            .iter()
            .map(|(name, table)| (name.as_str(), table.as_ref()))
            .collect(),
    };

    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&image, &mut bytes)
        .map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes an image and checks it against `schema`.
pub(crate) fn decode(bytes: &[u8], schema: &Schema) -> StoreResult<Snapshot> {
    let image: Image =
        ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))?;

    if image.format != FORMAT_VERSION {
        return Err(StoreError::codec(format!(
            "unsupported snapshot format {} (expected {FORMAT_VERSION})",
            image.format
        )));
    }

    let mut snapshot = Snapshot::empty(schema);
    for (name, table) in image.tables {
        match schema.get(&name) {
            Some(t) if !t.is_embedded() => {
                snapshot.tables.insert(name, Arc::new(table));
            }
            _ => return Err(StoreError::type_not_found(name)),
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Stored};
    use mirrordb_schema::{EntityType, Value};

    fn schema() -> Schema {
        Schema::builder()
            .entity(EntityType::builder("Tag").primary_key("name").scalar("color"))
            .build()
            .unwrap()
    }

    fn snapshot_with(schema: &Schema, tags: &[(&str, &str)]) -> Snapshot {
        let mut snapshot = Snapshot::empty(schema);
        let table = Arc::make_mut(snapshot.tables.get_mut("Tag").unwrap());
        for (name, color) in tags {
            let mut record = Record::default();
            record.0.insert("name".into(), Stored::Value(Value::from(*name)));
            record.0.insert("color".into(), Stored::Value(Value::from(*color)));
            table.insert(Value::from(*name), record);
        }
        snapshot
    }

    #[test]
    fn decode_restores_tables() {
        let schema = schema();
        let snapshot = snapshot_with(&schema, &[("red", "#f00"), ("blue", "#00f")]);

        let bytes = encode(&snapshot).unwrap();
        let decoded = decode(&bytes, &schema).unwrap();

        assert_eq!(decoded.table("Tag"), snapshot.table("Tag"));
    }

    #[test]
    fn encoding_is_independent_of_insert_order() {
        let schema = schema();
        let a = snapshot_with(&schema, &[("red", "#f00"), ("blue", "#00f")]);
        let b = snapshot_with(&schema, &[("blue", "#00f"), ("red", "#f00")]);

        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn rejects_unknown_table() {
        let schema = schema();
        let bytes = encode(&snapshot_with(&schema, &[("red", "#f00")])).unwrap();

        let other = Schema::builder()
            .entity(EntityType::builder("Label").primary_key("name"))
            .build()
            .unwrap();
        let err = decode(&bytes, &other).unwrap_err();
        assert!(matches!(err, StoreError::TypeNotFound { .. }));
    }

    #[test]
    fn rejects_garbage() {
        let err = decode(&[0xff, 0x00, 0x13], &schema()).unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }
}
