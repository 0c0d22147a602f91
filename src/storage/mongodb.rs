//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides [`MongoStore`], a [`DocumentStore`] over one
//! `mongodb::Collection<Document>`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! this-crud = { version = "0.0.9", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One collection per entity type, named by `T::collection_name()`. Records
//! keep MongoDB's own `_id`; the application identifier lives in a separate
//! `id` field written by the repository.
//!
//! Every cursor opened here is drained with `try_collect` before returning,
//! so it is closed on success and on error alike.

use crate::core::entity::Entity;
use crate::core::error::{CrudError, Result};
use crate::core::pipeline::Pipeline;
use crate::core::store::{DocumentStore, FindOptions};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::{Collection, Database};

/// Document store backed by a MongoDB collection.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use crud::storage::MongoStore;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let db = client.database("mydb");
/// let repo = Repository::<Article, _>::new(MongoStore::for_entity::<Article>(&db));
/// ```
#[derive(Clone, Debug)]
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Bind to the named collection of `database`
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }

    /// Bind to the collection of entity type `T`
    pub fn for_entity<T: Entity>(database: &Database) -> Self {
        Self::new(database, T::collection_name())
    }

    /// Wrap an existing collection handle
    pub fn from_collection(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    /// Get a reference to the underlying collection.
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    fn error(&self, operation: &'static str) -> impl FnOnce(mongodb::error::Error) -> CrudError {
        let collection = self.collection.name().to_string();
        move |source| CrudError::Mongo {
            collection,
            operation,
            source,
        }
    }
}

/// Driver limits are signed; 0 keeps its "no limit" meaning.
fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection_name(&self) -> &str {
        self.collection.name()
    }

    async fn insert_one(&self, record: Document) -> Result<Bson> {
        let result = self
            .collection
            .insert_one(record)
            .await
            .map_err(self.error("insert record"))?;
        Ok(result.inserted_id)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<()> {
        self.collection
            .update_one(filter, update)
            .await
            .map_err(self.error("update record"))?;
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        self.collection
            .find_one(filter)
            .await
            .map_err(self.error("find record"))
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        let mut action = self.collection.find(filter).skip(options.skip);
        if options.limit > 0 {
            action = action.limit(to_i64(options.limit));
        }
        if let Some(sort) = options.sort {
            action = action.sort(sort);
        }

        let cursor = action.await.map_err(self.error("find records"))?;
        cursor
            .try_collect()
            .await
            .map_err(self.error("read find cursor"))
    }

    async fn count_documents(&self, filter: Document) -> Result<u64> {
        self.collection
            .count_documents(filter)
            .await
            .map_err(self.error("count records"))
    }

    async fn aggregate(&self, pipeline: Pipeline) -> Result<Vec<Document>> {
        let cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(self.error("run aggregation"))?;
        cursor
            .try_collect()
            .await
            .map_err(self.error("read aggregation cursor"))
    }

    async fn delete_one(&self, filter: Document) -> Result<()> {
        self.collection
            .delete_one(filter)
            .await
            .map_err(self.error("delete record"))?;
        Ok(())
    }
}
