//! Data store port: the backend collections the admin console reads and
//! mutates, behind a trait so the aggregation and list code can run against
//! MongoDB in production and an in-memory double in tests.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed record in {collection}: {message}")]
    Malformed { collection: String, message: String },
}

impl StoreError {
    pub fn malformed(collection: &str, message: impl Into<String>) -> Self {
        StoreError::Malformed {
            collection: collection.to_string(),
            message: message.into(),
        }
    }
}

/// A single predicate on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Lte(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Bson>) -> Self {
        Filter::In(field.into(), values)
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _)
            | Filter::Gte(field, _)
            | Filter::Lt(field, _)
            | Filter::Lte(field, _)
            | Filter::In(field, _) => field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filters, ordering and an optional skip/limit window for a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl StoreQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn range(mut self, skip: u64, limit: u64) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(Document),
    Update { filters: Vec<Filter>, set: Document },
    Delete { filters: Vec<Filter> },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read the records of `collection` matching `query`.
    async fn query(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError>;

    /// Count the records of `collection` matching every filter.
    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Apply `mutation` and return the number of affected records.
    async fn mutate(&self, collection: &str, mutation: Mutation) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
