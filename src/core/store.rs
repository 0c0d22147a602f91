//! Document store adapter trait
//!
//! The repository never talks to a database directly; it hands filter
//! documents and aggregation pipelines to a [`DocumentStore`]. Each store
//! instance is bound to one collection.

use crate::core::error::Result;
use crate::core::pipeline::Pipeline;
use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;

/// Options of a direct `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Number of matching records to skip
    pub skip: u64,

    /// Maximum number of records to return, 0 for no limit
    pub limit: u64,

    /// Sort specification (`{field: 1 | -1}`)
    pub sort: Option<Document>,
}

/// Storage operations over one collection
///
/// Implementations must release any cursor they open before returning, on
/// every path. Cancellation is handled by the caller dropping the future.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the underlying collection
    fn collection_name(&self) -> &str;

    /// Insert a document and return its generated `_id`
    async fn insert_one(&self, record: Document) -> Result<Bson>;

    /// Apply an update document to the first record matching `filter`
    async fn update_one(&self, filter: Document, update: Document) -> Result<()>;

    /// First record matching `filter`, if any
    async fn find_one(&self, filter: Document) -> Result<Option<Document>>;

    /// Records matching `filter`, sorted then sliced
    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>>;

    /// Number of records matching `filter`
    async fn count_documents(&self, filter: Document) -> Result<u64>;

    /// Run an aggregation pipeline
    async fn aggregate(&self, pipeline: Pipeline) -> Result<Vec<Document>>;

    /// Remove the first record matching `filter`
    async fn delete_one(&self, filter: Document) -> Result<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn collection_name(&self) -> &str {
        (**self).collection_name()
    }

    async fn insert_one(&self, record: Document) -> Result<Bson> {
        (**self).insert_one(record).await
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<()> {
        (**self).update_one(filter, update).await
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        (**self).find_one(filter).await
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        (**self).find(filter, options).await
    }

    async fn count_documents(&self, filter: Document) -> Result<u64> {
        (**self).count_documents(filter).await
    }

    async fn aggregate(&self, pipeline: Pipeline) -> Result<Vec<Document>> {
        (**self).aggregate(pipeline).await
    }

    async fn delete_one(&self, filter: Document) -> Result<()> {
        (**self).delete_one(filter).await
    }
}
