//! Document store port
//!
//! The persistent store is an external collaborator; the sync server only
//! depends on this boundary: point reads/writes, atomic multi-document
//! batches, filtered collection queries, and collection-group queries that
//! span one leaf collection name across organizations.
//!
//! [`MemoryStore`] implements the port for tests and the dev binary.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::utils::AppResult;

pub use memory::MemoryStore;

/// A stored document with its id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// One write inside an atomic batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace the document
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Shallow-merge top-level fields into the document (creates it when
    /// absent). Fields not named in `data` are left untouched.
    Merge {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Field filter on a (dotted-path) document field
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    Ge(String, Value),
    Gt(String, Value),
    Le(String, Value),
    Lt(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A collection-scoped (or collection-group) query
#[derive(Debug, Clone)]
pub struct Query {
    /// Full collection path, or the bare leaf name for group queries
    pub collection: String,
    /// Match any collection whose path ends in `/{collection}`
    pub collection_group: bool,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            collection_group: false,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn group(leaf: impl Into<String>) -> Self {
        Self {
            collection_group: true,
            ..Self::collection(leaf)
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The store boundary. Only the atomicity of [`DocumentStore::commit`]
/// batches is assumed; the store's own consistency model is out of scope.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>>;

    async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Apply every op or none of them
    async fn commit(&self, batch: Vec<WriteOp>) -> AppResult<()>;

    async fn query(&self, query: Query) -> AppResult<Vec<Document>>;
}

/// Collection path for an org-scoped collection
pub fn org_collection(org_id: &str, name: &str) -> String {
    format!("organizations/{org_id}/{name}")
}

/// Read a possibly-dotted field path out of a JSON document
pub fn field_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}
