use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Collection, Database};

use super::{DataStore, Direction, Filter, Mutation, StoreError, StoreQuery};

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

/// Translate filters into a MongoDB filter document. Several operators on the
/// same field are merged into one operator document.
pub fn filter_document(filters: &[Filter]) -> Document {
    let mut filter = Document::new();

    for item in filters {
        let (operator, value) = match item {
            Filter::Eq(field, value) => {
                filter.insert(field.as_str(), value.clone());
                continue;
            }
            Filter::Gte(_, value) => ("$gte", value.clone()),
            Filter::Lt(_, value) => ("$lt", value.clone()),
            Filter::Lte(_, value) => ("$lte", value.clone()),
            Filter::In(_, values) => ("$in", Bson::Array(values.clone())),
        };

        match filter.get_document_mut(item.field()) {
            Ok(operators) => {
                operators.insert(operator, value);
            }
            Err(_) => {
                let mut operators = Document::new();
                operators.insert(operator, value);
                filter.insert(item.field(), operators);
            }
        }
    }

    filter
}

#[async_trait]
impl DataStore for MongoStore {
    async fn query(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        let handle = self.collection(collection);
        let mut find = handle.find(filter_document(&query.filters));

        if let Some((field, direction)) = &query.order_by {
            let order = match direction {
                Direction::Ascending => 1,
                Direction::Descending => -1,
            };
            let mut sort = Document::new();
            sort.insert(field.as_str(), order);
            find = find.sort(sort);
        }
        if let Some(skip) = query.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = query.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = find.await?;
        let records: Vec<Document> = cursor.try_collect().await?;

        tracing::debug!("📂 {} returned {} records", collection, records.len());
        Ok(records)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let count = self
            .collection(collection)
            .count_documents(filter_document(filters))
            .await?;
        Ok(count)
    }

    async fn mutate(&self, collection: &str, mutation: Mutation) -> Result<u64, StoreError> {
        let collection_handle = self.collection(collection);

        let affected = match mutation {
            Mutation::Insert(document) => {
                collection_handle.insert_one(document).await?;
                1
            }
            Mutation::Update { filters, set } => {
                collection_handle
                    .update_many(filter_document(&filters), doc! { "$set": set })
                    .await?
                    .matched_count
            }
            Mutation::Delete { filters } => {
                collection_handle
                    .delete_many(filter_document(&filters))
                    .await?
                    .deleted_count
            }
        };

        tracing::info!("✏️ {} mutation affected {} records", collection, affected);
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
