use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use super::{DataStore, Direction, Filter, Mutation, StoreError, StoreQuery};

/// In-process collections, evaluated with the same filter semantics as the
/// MongoDB adapter. Used for local runs without a database and in tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, collection: &str, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            records.push(document);
        }
    }
}

fn compare(left: &Bson, right: &Bson) -> Option<Ordering> {
    match (left, right) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn matches(document: &Document, filter: &Filter) -> bool {
    let Some(value) = document.get(filter.field()) else {
        return false;
    };

    match filter {
        Filter::Eq(_, expected) => compare(value, expected) == Some(Ordering::Equal),
        Filter::Gte(_, bound) => matches!(compare(value, bound), Some(Ordering::Greater | Ordering::Equal)),
        Filter::Lt(_, bound) => compare(value, bound) == Some(Ordering::Less),
        Filter::Lte(_, bound) => matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal)),
        Filter::In(_, candidates) => candidates
            .iter()
            .any(|candidate| compare(value, candidate) == Some(Ordering::Equal)),
    }
}

fn matches_all(document: &Document, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(document, filter))
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn query(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut records: Vec<Document> = collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|document| matches_all(document, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = &query.order_by {
            records.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(left), Some(right)) => compare(left, right).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(records.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|records| records.iter().filter(|document| matches_all(document, filters)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn mutate(&self, collection: &str, mutation: Mutation) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();

        let affected = match mutation {
            Mutation::Insert(mut document) => {
                if !document.contains_key("_id") {
                    document.insert("_id", ObjectId::new());
                }
                records.push(document);
                1
            }
            Mutation::Update { filters, set } => {
                let mut affected = 0;
                for document in records.iter_mut().filter(|document| matches_all(document, &filters)) {
                    for (key, value) in &set {
                        document.insert(key.clone(), value.clone());
                    }
                    affected += 1;
                }
                affected
            }
            Mutation::Delete { filters } => {
                let before = records.len();
                records.retain(|document| !matches_all(document, &filters));
                (before - records.len()) as u64
            }
        };

        Ok(affected)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
