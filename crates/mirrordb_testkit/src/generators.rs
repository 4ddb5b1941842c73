//! Property-based test generators using proptest.
//!
//! Provides strategies for scalar values and for whole shop datasets that
//! respect the shop schema's invariants (unique keys, links to existing
//! instances).

use crate::fixtures::{address, customer, order, order_line, product, put, tag};
use mirrordb_schema::Value;
use mirrordb_store::{ListItem, MemoryStore};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Tag names used by generated datasets.
pub const TAG_NAMES: [&str; 4] = ["red", "green", "blue", "gold"];

/// Strategy for scalar values that are valid collection elements.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-z ]{0,12}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        prop::array::uniform16(any::<u8>()).prop_map(|b| Value::Uuid(Uuid::from_bytes(b))),
    ]
}

/// Generated customer fields.
#[derive(Debug, Clone)]
pub struct CustomerSpec {
    /// Display name.
    pub name: String,
    /// City of the embedded address, if any.
    pub city: Option<String>,
    /// Linked tag names.
    pub tags: Vec<&'static str>,
}

/// Generated order fields.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    /// Picks the customer among the dataset's customers.
    pub customer: Index,
    /// Lines as (product pick, quantity).
    pub lines: Vec<(Index, i64)>,
    /// Free-form notes.
    pub notes: Vec<String>,
}

/// A consistent set of shop instances.
#[derive(Debug, Clone)]
pub struct ShopDataset {
    /// Customers by id. Never empty.
    pub customers: BTreeMap<i64, CustomerSpec>,
    /// Product prices by sku.
    pub products: BTreeMap<String, i64>,
    /// Orders by id.
    pub orders: BTreeMap<i64, OrderSpec>,
}

impl ShopDataset {
    /// Writes the dataset into `store` in one transaction.
    pub fn load_into(&self, store: &MemoryStore) {
        let schema = store.schema_arc();

        let customers: Vec<_> = self
            .customers
            .iter()
            .map(|(id, spec)| {
                let c = customer(&schema, *id, &spec.name);
                if let Some(city) = &spec.city {
                    c.set("address", address(&schema, "Main St", city))
                        .expect("Failed to set address");
                }
                let tags = spec
                    .tags
                    .iter()
                    .map(|name| ListItem::Object(tag(&schema, name)))
                    .collect::<Vec<_>>();
                c.set("tags", tags).expect("Failed to set tags");
                c
            })
            .collect();

        let products: Vec<_> = self
            .products
            .iter()
            .map(|(sku, price)| product(&schema, sku, &sku.to_uppercase(), *price))
            .collect();

        let mut objects = customers.clone();
        objects.extend(products.iter().cloned());
        for (id, spec) in &self.orders {
            let owner = spec.customer.get(customers.as_slice());
            let lines = if products.is_empty() {
                Vec::new()
            } else {
                spec.lines
                    .iter()
                    .map(|(pick, qty)| order_line(&schema, pick.get(products.as_slice()), *qty))
                    .collect()
            };
            let o = order(&schema, *id, owner, lines);
            let notes = spec
                .notes
                .iter()
                .map(|n| ListItem::Value(Value::from(n.as_str())))
                .collect::<Vec<_>>();
            o.set("notes", notes).expect("Failed to set notes");
            objects.push(o);
        }

        put(store, &objects);
    }

    /// Number of top-level instances the dataset produces per type.
    pub fn expected_counts(&self) -> BTreeMap<&'static str, usize> {
        let tags: BTreeSet<_> =
            self.customers.values().flat_map(|c| c.tags.iter()).collect();
        BTreeMap::from([
            ("Customer", self.customers.len()),
            ("Order", self.orders.len()),
            ("Product", self.products.len()),
            ("Tag", tags.len()),
        ])
    }
}

fn customer_spec_strategy() -> impl Strategy<Value = CustomerSpec> {
    (
        "[A-Z][a-z]{1,8}",
        prop::option::of("[A-Z][a-z]{2,10}"),
        prop::sample::subsequence(TAG_NAMES.to_vec(), 0..=TAG_NAMES.len()),
    )
        .prop_map(|(name, city, tags)| CustomerSpec { name, city, tags })
}

fn order_spec_strategy() -> impl Strategy<Value = OrderSpec> {
    (
        any::<Index>(),
        prop::collection::vec((any::<Index>(), 1i64..20), 0..4),
        prop::collection::vec("[a-z]{1,10}", 0..3),
    )
        .prop_map(|(customer, lines, notes)| OrderSpec {
            customer,
            lines,
            notes,
        })
}

/// Strategy for shop datasets with at least one customer.
pub fn shop_dataset_strategy() -> impl Strategy<Value = ShopDataset> {
    (
        prop::collection::btree_map(1i64..50, customer_spec_strategy(), 1..6),
        prop::collection::btree_map("[a-z]{3,6}", 100i64..10_000, 0..5),
        prop::collection::btree_map(1i64..200, order_spec_strategy(), 0..8),
    )
        .prop_map(|(customers, products, orders)| ShopDataset {
            customers,
            products,
            orders,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::shop_schema;
    use mirrordb_store::ObjectStore;

    proptest! {
        #[test]
        fn scalar_values_are_valid_elements(value in scalar_value_strategy()) {
            prop_assert!(!value.is_nested());
        }

        #[test]
        fn datasets_load_with_expected_counts(dataset in shop_dataset_strategy()) {
            let store = MemoryStore::new(shop_schema());
            dataset.load_into(&store);

            for (type_name, expected) in dataset.expected_counts() {
                prop_assert_eq!(store.count(type_name).unwrap(), expected);
            }
        }
    }
}
