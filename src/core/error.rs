//! Typed error handling for repositories and document stores
//!
//! Every fallible operation in the crate returns [`CrudError`]. The variants
//! map onto four categories callers usually care about:
//!
//! - store failures ([`CrudError::Store`], and [`CrudError::Mongo`] with the
//!   `mongodb_backend` feature), surfaced verbatim from the backend
//! - marshalling failures ([`CrudError::Marshal`], [`CrudError::Decode`]),
//!   raised before (or instead of) touching the store
//! - cancellation ([`CrudError::Cancelled`], [`CrudError::DeadlineExceeded`])
//! - unsupported filter or pipeline operators in the in-memory store
//!
//! "Not found" is never an error: single-record lookups return `Ok(None)`.
//!
//! # Example
//!
//! ```rust,ignore
//! match repo.get(&ctx, &where_).await {
//!     Ok(Some(article)) => println!("found {}", article.id),
//!     Ok(None) => println!("nothing matched"),
//!     Err(CrudError::Cancelled) => println!("request was cancelled"),
//!     Err(e) => eprintln!("[{}] {}", e.error_code(), e),
//! }
//! ```

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = CrudError> = std::result::Result<T, E>;

/// The main error type of the crate
#[derive(Debug, Error)]
pub enum CrudError {
    /// A store operation failed for a reason reported by the store itself
    #[error("Failed to {operation} on '{collection}': {message}")]
    Store {
        collection: String,
        operation: &'static str,
        message: String,
    },

    /// The MongoDB driver reported an error
    #[cfg(feature = "mongodb_backend")]
    #[error("Failed to {operation} on '{collection}': {source}")]
    Mongo {
        collection: String,
        operation: &'static str,
        #[source]
        source: mongodb::error::Error,
    },

    /// An entity field could not be converted into a document value
    #[error("Failed to marshal field '{field}': {message}")]
    Marshal { field: String, message: String },

    /// A stored document could not be converted back into an entity
    #[error("Failed to decode record from '{collection}': {source}")]
    Decode {
        collection: String,
        #[source]
        source: bson::de::Error,
    },

    /// A record written by `insert` could not be read back
    #[error("Record inserted into '{collection}' was not found on read-back")]
    MissingInsertedRecord { collection: String },

    /// The filter or pipeline used an operator the store cannot evaluate
    #[error("Unsupported operator '{operator}' in {context}")]
    Unsupported {
        operator: String,
        context: &'static str,
    },

    /// The caller cancelled the request
    #[error("Operation cancelled")]
    Cancelled,

    /// The request deadline passed before the operation completed
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

impl CrudError {
    /// Build a [`CrudError::Store`] error
    pub fn store(
        collection: impl Into<String>,
        operation: &'static str,
        message: impl ToString,
    ) -> Self {
        CrudError::Store {
            collection: collection.into(),
            operation,
            message: message.to_string(),
        }
    }

    /// Build a [`CrudError::Marshal`] error
    pub fn marshal(field: impl Into<String>, message: impl ToString) -> Self {
        CrudError::Marshal {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Build a [`CrudError::Unsupported`] error
    pub fn unsupported(operator: impl Into<String>, context: &'static str) -> Self {
        CrudError::Unsupported {
            operator: operator.into(),
            context,
        }
    }

    /// Whether the error comes from the caller's cancellation or deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CrudError::Cancelled | CrudError::DeadlineExceeded)
    }

    /// Stable error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CrudError::Store { .. } => "STORE_ERROR",
            #[cfg(feature = "mongodb_backend")]
            CrudError::Mongo { .. } => "STORE_ERROR",
            CrudError::Marshal { .. } => "MARSHAL_ERROR",
            CrudError::Decode { .. } => "DECODE_ERROR",
            CrudError::MissingInsertedRecord { .. } => "MISSING_INSERTED_RECORD",
            CrudError::Unsupported { .. } => "UNSUPPORTED_OPERATOR",
            CrudError::Cancelled => "CANCELLED",
            CrudError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}
