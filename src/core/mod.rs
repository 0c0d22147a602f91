//! Core module containing the filter builder, the listing engine and the repository

pub mod context;
pub mod entity;
pub mod error;
pub mod field;
pub mod hooks;
pub mod listing;
pub mod pipeline;
pub mod query;
pub mod repository;
pub mod store;

pub use context::RequestContext;
pub use entity::Entity;
pub use error::{CrudError, Result};
pub use field::{FieldDescriptor, FieldValue, ToFieldValue, to_document, to_field_map};
pub use listing::{ListOptions, ListParams, Page, PageMeta, PipelineHook, QueryHook};
pub use pipeline::Pipeline;
pub use query::QueryBuilder;
pub use repository::Repository;
pub use store::{DocumentStore, FindOptions};
