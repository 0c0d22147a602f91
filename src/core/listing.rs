//! List requests, page results and query-string parameters

use crate::config::CrudConfig;
use crate::core::pipeline::Pipeline;
use crate::core::query::QueryBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller hook extending the filter before it is built
pub type QueryHook = Box<dyn Fn(&mut QueryBuilder) + Send + Sync>;

/// Caller hook extending the aggregation before the `$facet` stage
///
/// Receives the stages built so far (the `$match`, if any) and returns the
/// stages to run. This is the extension point for `$lookup`, `$project`,
/// `$unwind` and friends.
pub type PipelineHook = Box<dyn Fn(Pipeline) -> Pipeline + Send + Sync>;

/// A page query against one collection
///
/// Built per call and consumed by the listing operation.
///
/// # Example
/// ```rust,ignore
/// let options = ListOptions::<Article>::new()
///     .with_limit(10)
///     .with_skip(20)
///     .with_search("rust", ["title", "body"])
///     .with_custom_query(|q| {
///         q.ne("isDeleted", true);
///     });
/// let page = repo.list(&ctx, options).await?;
/// ```
pub struct ListOptions<T> {
    /// Page size, 0 for no limit
    pub limit: u64,

    /// Number of matching records to skip
    pub skip: u64,

    /// Field to sort by (defaults to the creation timestamp)
    pub sort_by: Option<String>,

    /// Sort direction for `sort_by`
    pub sort_desc: bool,

    /// Identifier allow-list
    pub ids: Vec<String>,

    /// Free-text search term
    pub search: String,

    /// Fields searched for `search`
    pub search_in: Vec<String>,

    /// Entity template: every non-zero field must match
    pub filter: Option<T>,

    /// Filter extension hook
    pub custom_query: Option<QueryHook>,

    /// Pipeline extension hook
    pub custom_pipeline: Option<PipelineHook>,
}

impl<T> Default for ListOptions<T> {
    fn default() -> Self {
        Self {
            limit: 0,
            skip: 0,
            sort_by: None,
            sort_desc: false,
            ids: Vec::new(),
            search: String::new(),
            search_in: Vec::new(),
            filter: None,
            custom_query: None,
            custom_pipeline: None,
        }
    }
}

impl<T> ListOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_by = Some(field.into());
        self.sort_desc = descending;
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search<I, S>(mut self, keyword: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = keyword.into();
        self.search_in = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, template: T) -> Self {
        self.filter = Some(template);
        self
    }

    pub fn with_custom_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut QueryBuilder) + Send + Sync + 'static,
    {
        self.custom_query = Some(Box::new(hook));
        self
    }

    pub fn with_custom_pipeline<F>(mut self, hook: F) -> Self
    where
        F: Fn(Pipeline) -> Pipeline + Send + Sync + 'static,
    {
        self.custom_pipeline = Some(Box::new(hook));
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for ListOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListOptions")
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("sort_by", &self.sort_by)
            .field("sort_desc", &self.sort_desc)
            .field("ids", &self.ids)
            .field("search", &self.search)
            .field("search_in", &self.search_in)
            .field("filter", &self.filter)
            .field("custom_query", &self.custom_query.is_some())
            .field("custom_pipeline", &self.custom_pipeline.is_some())
            .finish()
    }
}

/// One page of entities plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// The page, in sort order
    pub data: Vec<T>,

    /// Number of records matching the filter, ignoring skip and limit
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Page<T> {
    /// Pagination metadata for this page
    pub fn meta(&self, limit: u64, skip: u64) -> PageMeta {
        PageMeta::new(limit, skip, self.total)
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    /// Page size used for the query (0 = unbounded)
    pub limit: u64,

    /// Offset used for the query
    pub skip: u64,

    /// Total number of matching records
    pub total: u64,

    /// Whether records exist after this page
    pub has_next: bool,

    /// Whether records exist before this page
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(limit: u64, skip: u64, total: u64) -> Self {
        let has_next = limit > 0 && skip.saturating_add(limit) < total;
        Self {
            limit,
            skip,
            total,
            has_next,
            has_prev: skip > 0,
        }
    }
}

/// Query-string parameters of a list request
///
/// # Example
/// ```text
/// GET /articles?page=2&limit=10
/// GET /articles?search=rust&search_in=title,body&sort=views:desc
/// GET /articles?ids=a1,b2,c3
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// Page number (starts at 1), ignored when `skip` is given
    pub page: Option<u64>,

    /// Explicit offset
    pub skip: Option<u64>,

    /// Page size, clamped to `1..=max_limit`
    pub limit: Option<u64>,

    /// `field`, `field:asc` or `field:desc`
    pub sort: Option<String>,

    /// Free-text search term
    pub search: Option<String>,

    /// Comma-separated fields to search
    pub search_in: Option<String>,

    /// Comma-separated identifier allow-list
    pub ids: Option<String>,
}

impl ListParams {
    /// Page size, ensuring it stays within the configured bounds
    pub fn limit(&self, config: &CrudConfig) -> u64 {
        self.limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit.max(1))
    }

    /// Offset, derived from `page` when `skip` is absent
    pub fn skip(&self, config: &CrudConfig) -> u64 {
        match (self.skip, self.page) {
            (Some(skip), _) => skip,
            (None, Some(page)) => page
                .max(1)
                .saturating_sub(1)
                .saturating_mul(self.limit(config)),
            (None, None) => 0,
        }
    }

    /// Parse `sort` into a field and a descending flag
    pub fn sort(&self) -> Option<(String, bool)> {
        let raw = self.sort.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once(':') {
            Some((field, direction)) => Some((
                field.trim().to_string(),
                direction.trim().eq_ignore_ascii_case("desc"),
            )),
            None => Some((raw.to_string(), false)),
        }
    }

    /// Convert into list options for entity type `T`
    pub fn into_options<T>(self, config: &CrudConfig) -> ListOptions<T> {
        let mut options = ListOptions::new()
            .with_limit(self.limit(config))
            .with_skip(self.skip(config))
            .with_ids(split_list(self.ids.as_deref()))
            .with_search(
                self.search.clone().unwrap_or_default(),
                split_list(self.search_in.as_deref()),
            );
        if let Some((field, descending)) = self.sort() {
            options = options.with_sort(field, descending);
        }
        options
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
