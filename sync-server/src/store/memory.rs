//! In-memory implementation of the document store port
//!
//! Backs the dev binary and every test. Batch commits validate all ops
//! first and then apply under one write lock, so a batch is observed
//! all-or-nothing.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::utils::{AppError, AppResult};

use super::{Direction, Document, DocumentStore, Filter, Query, WriteOp, field_value};

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_op(op: &WriteOp) -> AppResult<()> {
        match op {
            WriteOp::Set { data, .. } | WriteOp::Merge { data, .. } => {
                if !data.is_object() {
                    return Err(AppError::store("document data must be a JSON object"));
                }
                Ok(())
            }
            WriteOp::Delete { .. } => Ok(()),
        }
    }

    fn apply_op(collections: &mut Collections, op: WriteOp) {
        match op {
            WriteOp::Set { collection, id, data } => {
                collections.entry(collection).or_default().insert(id, data);
            }
            WriteOp::Merge { collection, id, data } => {
                let docs = collections.entry(collection).or_default();
                match docs.get_mut(&id) {
                    Some(Value::Object(existing)) => {
                        if let Value::Object(fields) = data {
                            for (k, v) in fields {
                                existing.insert(k, v);
                            }
                        }
                    }
                    _ => {
                        docs.insert(id, data);
                    }
                }
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }

    fn matches(doc: &Value, filters: &[Filter]) -> bool {
        filters.iter().all(|filter| {
            let (path, expected, wanted): (&str, &Value, &[Ordering]) = match filter {
                Filter::Eq(p, v) => (p, v, &[Ordering::Equal]),
                Filter::Ge(p, v) => (p, v, &[Ordering::Greater, Ordering::Equal]),
                Filter::Gt(p, v) => (p, v, &[Ordering::Greater]),
                Filter::Le(p, v) => (p, v, &[Ordering::Less, Ordering::Equal]),
                Filter::Lt(p, v) => (p, v, &[Ordering::Less]),
            };
            match field_value(doc, path) {
                Some(actual) => cmp_values(actual, expected)
                    .map(|ord| wanted.contains(&ord))
                    .unwrap_or(false),
                None => false,
            }
        })
    }
}

/// Total-enough ordering over the JSON scalar types the store filters on
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()> {
        self.commit(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        }])
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.commit(vec![WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }])
        .await
    }

    async fn commit(&self, batch: Vec<WriteOp>) -> AppResult<()> {
        // Validate everything before touching state: all-or-nothing.
        for op in &batch {
            Self::check_op(op)?;
        }
        let mut collections = self.collections.write();
        for op in batch {
            Self::apply_op(&mut collections, op);
        }
        Ok(())
    }

    async fn query(&self, query: Query) -> AppResult<Vec<Document>> {
        let collections = self.collections.read();
        let group_suffix = format!("/{}", query.collection);

        let mut results: Vec<Document> = collections
            .iter()
            .filter(|(path, _)| {
                if query.collection_group {
                    path.ends_with(&group_suffix) || **path == query.collection
                } else {
                    **path == query.collection
                }
            })
            .flat_map(|(_, docs)| docs.iter())
            .filter(|(_, doc)| Self::matches(doc, &query.filters))
            .map(|(id, doc)| Document {
                id: id.clone(),
                data: doc.clone(),
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            results.sort_by(|a, b| {
                let ord = match (field_value(&a.data, field), field_value(&b.data, field)) {
                    (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }
}
