//! # This-CRUD
//!
//! A generic CRUD and listing layer for document databases.
//!
//! ## Features
//!
//! - **Filter Builder**: accumulate AND / OR predicates, build one query document
//! - **Listing Engine**: paginated listings with search, id allow-lists,
//!   entity templates and caller hooks, either through a single `$facet`
//!   aggregation or a `find` plus a separate count
//! - **Repository**: insert / update / get / exists / count / delete /
//!   archive with automatic identifiers and timestamps
//! - **Explicit Schemas**: entities list their stored fields through
//!   macros, zero-valued fields are never written
//! - **Pluggable Storage**: in-memory store for tests, MongoDB behind the
//!   `mongodb_backend` feature
//! - **Request Scoped**: every call honours a cancellation token and deadline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crud::prelude::*;
//!
//! #[derive(Clone, Debug, Default, Deserialize)]
//! #[serde(default, rename_all = "camelCase")]
//! pub struct Article {
//!     pub id: String,
//!     pub title: String,
//!     pub views: i64,
//!     pub created_at: String,
//! }
//!
//! impl_entity!(Article, "articles", id: id, [id, title, views]);
//!
//! let repo = Repository::<Article, _>::new(InMemoryStore::for_entity::<Article>());
//! let ctx = RequestContext::new();
//!
//! let article = repo
//!     .insert(&ctx, Article { title: "Hello".into(), ..Default::default() })
//!     .await?;
//!
//! let page = repo
//!     .list(&ctx, ListOptions::new().with_limit(10).with_search("hel", ["title"]))
//!     .await?;
//! assert_eq!(page.total, 1);
//!
//! repo.archive(&ctx, &article.id).await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        context::RequestContext,
        entity::Entity,
        error::{CrudError, Result},
        field::{FieldDescriptor, FieldValue, ToFieldValue},
        listing::{ListOptions, ListParams, Page, PageMeta},
        pipeline::Pipeline,
        query::QueryBuilder,
        repository::Repository,
        store::{DocumentStore, FindOptions},
    };

    // === Macros ===
    pub use crate::{impl_entity, impl_field_object};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config ===
    pub use crate::config::{CrudConfig, FieldNames};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use bson::{Bson, Document, doc};
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
