//! In-memory implementation of DocumentStore for testing and development
//!
//! Evaluates filters, updates and aggregation pipelines against documents
//! held in a vector, in insertion order. Only the operators the repository
//! and common caller hooks need are understood; anything else is reported
//! as [`CrudError::Unsupported`](crate::core::error::CrudError::Unsupported).

mod aggregate;
mod matcher;
mod values;

use crate::core::entity::Entity;
use crate::core::error::{CrudError, Result};
use crate::core::pipeline::{self, Pipeline};
use crate::core::store::{DocumentStore, FindOptions};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use std::sync::{Arc, RwLock};

/// In-memory document store bound to one collection
///
/// Cloning shares the underlying records. Uses RwLock for thread-safe access.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    collection: String,
    records: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryStore {
    /// Create an empty store for the named collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create an empty store for the collection of entity type `T`
    pub fn for_entity<T: Entity>() -> Self {
        Self::new(T::collection_name())
    }

    /// Copy of every stored record, in insertion order
    pub fn records(&self) -> Result<Vec<Document>> {
        let records = self
            .records
            .read()
            .map_err(|e| CrudError::store(&self.collection, "acquire read lock", e))?;
        Ok(records.clone())
    }

    fn position(&self, records: &[Document], filter: &Document) -> Result<Option<usize>> {
        for (index, record) in records.iter().enumerate() {
            if matcher::matches(record, filter)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn insert_one(&self, record: Document) -> Result<Bson> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CrudError::store(&self.collection, "acquire write lock", e))?;

        let id = match record.get("_id") {
            Some(id) => id.clone(),
            None => Bson::ObjectId(ObjectId::new()),
        };
        if records
            .iter()
            .any(|existing| existing.get("_id") == Some(&id))
        {
            return Err(CrudError::store(
                &self.collection,
                "insert",
                format!("duplicate _id {}", id),
            ));
        }

        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (key, value) in record {
            if key != "_id" {
                stored.insert(key, value);
            }
        }
        records.push(stored);

        Ok(id)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CrudError::store(&self.collection, "acquire write lock", e))?;

        if let Some(index) = self.position(&records, &filter)? {
            let mut updated = records[index].clone();
            matcher::apply_update(&mut updated, &update)?;
            records[index] = updated;
        }

        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let records = self
            .records
            .read()
            .map_err(|e| CrudError::store(&self.collection, "acquire read lock", e))?;

        let index = self.position(&records, &filter)?;
        Ok(index.map(|i| records[i].clone()))
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        let mut stages = vec![pipeline::match_stage(filter)];
        if let Some(sort) = options.sort {
            stages.push(bson::doc! { "$sort": sort });
        }
        stages.extend(pipeline::paginate(options.skip, options.limit));

        self.aggregate(stages).await
    }

    async fn count_documents(&self, filter: Document) -> Result<u64> {
        let records = self
            .records
            .read()
            .map_err(|e| CrudError::store(&self.collection, "acquire read lock", e))?;

        let mut count = 0;
        for record in records.iter() {
            if matcher::matches(record, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn aggregate(&self, pipeline: Pipeline) -> Result<Vec<Document>> {
        let snapshot = self.records()?;
        aggregate::run(snapshot, &pipeline)
    }

    async fn delete_one(&self, filter: Document) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CrudError::store(&self.collection, "acquire write lock", e))?;

        if let Some(index) = self.position(&records, &filter)? {
            records.remove(index);
        }

        Ok(())
    }
}
