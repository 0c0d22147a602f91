//! Typed repository over one collection
//!
//! [`Repository<T, S>`] wires the filter builder, the marshaller and a
//! [`DocumentStore`] together:
//!
//! - writes (`insert`, `update`) marshal the entity, stamp bookkeeping
//!   fields and read the stored record back instead of trusting the
//!   in-memory copy
//! - single-record reads (`get`, `exists`, `count`) match by identifier when
//!   the probe entity carries one, otherwise by its non-zero fields
//! - listings come in two flavours, see [`list`](Repository::list) and
//!   [`find_many`](Repository::find_many)
//!
//! Archived records are *not* filtered out anywhere; add
//! `q.ne("isDeleted", true)` through a query hook to hide them.

use crate::config::CrudConfig;
use crate::core::context::RequestContext;
use crate::core::entity::Entity;
use crate::core::error::{CrudError, Result};
use crate::core::field::{to_document, to_field_map};
use crate::core::hooks;
use crate::core::listing::{ListOptions, Page};
use crate::core::pipeline::{self, Pipeline};
use crate::core::query::QueryBuilder;
use crate::core::store::{DocumentStore, FindOptions};
use bson::{Bson, Document, doc};
use chrono::Utc;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Generic CRUD repository for entity type `T` stored in `S`
///
/// # Example
///
/// ```rust,ignore
/// use crud::prelude::*;
///
/// let repo = Repository::<Article, _>::new(InMemoryStore::for_entity::<Article>());
/// let ctx = RequestContext::new();
///
/// let created = repo.insert(&ctx, Article { title: "a".into(), ..Default::default() }).await?;
/// let page = repo.list(&ctx, ListOptions::new().with_limit(10)).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Repository<T, S> {
    store: S,
    config: CrudConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> Repository<T, S> {
    /// Create a repository with the default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, CrudConfig::default())
    }

    /// Create a repository with a specific configuration
    pub fn with_config(store: S, config: CrudConfig) -> Self {
        Self {
            store,
            config,
            _marker: PhantomData,
        }
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the repository configuration
    pub fn config(&self) -> &CrudConfig {
        &self.config
    }
}

impl<T: Entity, S: DocumentStore> Repository<T, S> {
    // === Writes ===

    /// Insert a new entity and return the stored version
    ///
    /// An identifier is generated unless `item` carries one; creation and
    /// update timestamps are set to the same instant.
    pub async fn insert(&self, ctx: &RequestContext, item: T) -> Result<T> {
        let mut record = to_document(&item)?;
        hooks::before_insert(&mut record, &self.config.fields, Utc::now());
        let id = record.get(&self.config.fields.id).cloned();

        let inserted_id = ctx.run(self.store.insert_one(record)).await?;
        info!(
            collection = T::collection_name(),
            id = ?id,
            "Inserted record"
        );

        self.find_one(ctx, doc! { "_id": inserted_id })
            .await?
            .ok_or_else(|| CrudError::MissingInsertedRecord {
                collection: T::collection_name().to_string(),
            })
    }

    /// Apply the non-zero fields of `patch` to the record with identifier `id`
    ///
    /// Returns the stored version after the update, or `None` when no
    /// record has that identifier. The identifier itself is never changed.
    pub async fn update(&self, ctx: &RequestContext, id: &str, patch: T) -> Result<Option<T>> {
        let mut set = to_field_map(&patch)?;
        set.remove(&self.config.fields.id);

        let mut update = doc! { "$set": set };
        hooks::before_update(&mut update, &self.config.fields, Utc::now());

        ctx.run(self.store.update_one(self.id_filter(id), update))
            .await?;
        info!(collection = T::collection_name(), id, "Updated record");

        self.find_one(ctx, self.id_filter(id)).await
    }

    /// Remove the record with identifier `id`
    ///
    /// Succeeds when nothing matches.
    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        ctx.run(self.store.delete_one(self.id_filter(id))).await?;
        info!(collection = T::collection_name(), id, "Deleted record");
        Ok(())
    }

    /// Soft-delete the record with identifier `id`
    ///
    /// Sets the archive flag and timestamp; the record stays visible to
    /// every read operation.
    pub async fn archive(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let update = hooks::archive_update(&self.config.fields, Utc::now());
        ctx.run(self.store.update_one(self.id_filter(id), update))
            .await?;
        info!(collection = T::collection_name(), id, "Archived record");
        Ok(())
    }

    /// Clear the archive flag and timestamp of the record with identifier `id`
    pub async fn restore(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let update = hooks::restore_update(&self.config.fields);
        ctx.run(self.store.update_one(self.id_filter(id), update))
            .await?;
        info!(collection = T::collection_name(), id, "Restored record");
        Ok(())
    }

    // === Single-record reads ===

    /// First record matching `probe`
    ///
    /// Matches by identifier when `probe` carries one, otherwise by every
    /// non-zero field of `probe`. Returns `Ok(None)` when nothing matches.
    pub async fn get(&self, ctx: &RequestContext, probe: &T) -> Result<Option<T>> {
        let filter = self.probe_filter(probe)?;
        self.find_one(ctx, filter).await
    }

    /// Fetch the record with identifier `id`
    pub async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<T>> {
        self.find_one(ctx, self.id_filter(id)).await
    }

    /// Whether any record matches `probe` (same matching rule as [`get`](Self::get))
    pub async fn exists(&self, ctx: &RequestContext, probe: &T) -> Result<bool> {
        let filter = self.probe_filter(probe)?;
        let found = ctx.run(self.store.find_one(filter)).await?;
        Ok(found.is_some())
    }

    /// Number of records matching `probe` (same matching rule as [`get`](Self::get))
    pub async fn count(&self, ctx: &RequestContext, probe: &T) -> Result<u64> {
        let filter = self.probe_filter(probe)?;
        ctx.run(self.store.count_documents(filter)).await
    }

    // === Listings ===

    /// Paginated listing through a single `$facet` aggregation
    ///
    /// The page and the total come from the same matched set. The page is
    /// sorted by `sort_by` when the request names one, otherwise by creation
    /// time, newest first. Timestamps of every returned record are rendered
    /// with the configured date format.
    pub async fn list(&self, ctx: &RequestContext, options: ListOptions<T>) -> Result<Page<T>> {
        let filter = self.compose_filter(&options)?.build();
        let pipeline = self.list_pipeline(filter, &options);
        debug!(
            collection = T::collection_name(),
            stages = pipeline.len(),
            "Running list aggregation"
        );

        let rows = ctx.run(self.store.aggregate(pipeline)).await?;
        let (records, total) = pipeline::parse_page_result(rows, T::collection_name())?;
        let data = records
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { data, total })
    }

    /// Paginated listing through a direct `find` plus a separate count
    ///
    /// Honors `sort_by`/`sort_desc`. The two store calls are independent: a
    /// concurrent write between them can make `total` disagree with the page.
    /// Use [`list`](Self::list) when they must agree.
    pub async fn find_many(
        &self,
        ctx: &RequestContext,
        options: ListOptions<T>,
    ) -> Result<Page<T>> {
        let filter = self.compose_filter(&options)?.build();
        let find_options = FindOptions {
            skip: options.skip,
            limit: options.limit,
            sort: Some(self.page_sort(&options)),
        };
        debug!(
            collection = T::collection_name(),
            filter = %filter,
            "Running find with separate count"
        );

        let records = ctx
            .run(self.store.find(filter.clone(), find_options))
            .await?;
        let total = ctx.run(self.store.count_documents(filter)).await?;

        let timestamps = self.config.fields.timestamps();
        let data = records
            .into_iter()
            .map(|mut record| {
                pipeline::canonicalize_dates(&mut record, &timestamps, &self.config.date_format);
                Self::decode(record)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { data, total })
    }

    /// Compose the listing filter: search, identifier allow-list, entity
    /// template, then the caller's query hook
    pub fn compose_filter(&self, options: &ListOptions<T>) -> Result<QueryBuilder> {
        let mut query = QueryBuilder::new();
        query.add_search(&options.search_in, &options.search);
        query.add_ids(&self.config.fields.id, &options.ids);

        if let Some(template) = &options.filter {
            query.add(to_field_map(template)?);
        }

        if let Some(hook) = &options.custom_query {
            hook(&mut query);
        }

        Ok(query)
    }

    /// Stages of the aggregation run by [`list`](Self::list)
    pub fn list_pipeline(&self, filter: Document, options: &ListOptions<T>) -> Pipeline {
        let mut stages = Pipeline::new();
        if !filter.is_empty() {
            stages.push(pipeline::match_stage(filter));
        }

        if let Some(hook) = &options.custom_pipeline {
            stages = hook(stages);
        }

        stages.push(pipeline::facet_data_total(
            self.page_sort(options),
            options.skip,
            options.limit,
        ));

        pipeline::array_date_conversion(
            stages,
            "data",
            &self.config.fields.timestamps(),
            &self.config.date_format,
        )
    }

    // === Internals ===

    fn page_sort(&self, options: &ListOptions<T>) -> Document {
        match &options.sort_by {
            Some(field) if !field.is_empty() => pipeline::sort_spec(field, options.sort_desc),
            _ => pipeline::sort_spec(&self.config.fields.created_at, true),
        }
    }

    fn id_filter(&self, id: &str) -> Document {
        let mut query = QueryBuilder::new();
        query.eq(&self.config.fields.id, id);
        query.build()
    }

    fn probe_filter(&self, probe: &T) -> Result<Document> {
        let mut query = QueryBuilder::new();
        if probe.has_id() {
            query.eq(&self.config.fields.id, probe.id());
        } else {
            query.add(to_field_map(probe)?);
        }
        Ok(query.build())
    }

    async fn find_one(&self, ctx: &RequestContext, filter: Document) -> Result<Option<T>> {
        let stages = pipeline::named_date_conversions(
            vec![pipeline::match_stage(filter), doc! { "$limit": 1_i64 }],
            &self.config.fields.timestamps(),
            &self.config.date_format,
        );

        let rows = ctx.run(self.store.aggregate(stages)).await?;
        rows.into_iter().next().map(Self::decode).transpose()
    }

    fn decode(record: Document) -> Result<T> {
        bson::from_bson(Bson::Document(record)).map_err(|source| CrudError::Decode {
            collection: T::collection_name().to_string(),
            source,
        })
    }
}
