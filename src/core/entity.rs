//! Entity trait defining what a repository can store

use crate::core::field::FieldDescriptor;
use serde::de::DeserializeOwned;

/// Base trait for all entities stored through a [`Repository`](crate::core::repository::Repository).
///
/// An entity:
/// - lives in one collection, named by [`collection_name`](Entity::collection_name)
/// - reports its own identifier (empty until the repository assigns one)
/// - describes its stored fields explicitly through [`schema`](Entity::schema),
///   which the marshaller uses instead of runtime reflection
/// - deserializes from a stored document; since zero-valued fields are never
///   written, entity structs should carry `#[serde(default)]`
///
/// Most implementations are generated with [`impl_entity!`](crate::impl_entity).
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection this entity type is stored in (e.g., "articles")
    fn collection_name() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> &str;

    /// Stored fields of this entity, in storage order
    fn schema() -> Vec<FieldDescriptor<Self>>;

    /// Check if the entity carries an identifier
    fn has_id(&self) -> bool {
        !self.id().is_empty()
    }
}
