//! Configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Names of the bookkeeping fields the repository writes and reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Application-level identifier (distinct from the store's `_id`)
    pub id: String,

    /// Creation timestamp
    pub created_at: String,

    /// Last update timestamp
    pub updated_at: String,

    /// Archive (soft delete) timestamp
    pub deleted_at: String,

    /// Archive (soft delete) flag
    pub is_deleted: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            created_at: "createdAt".to_string(),
            updated_at: "updatedAt".to_string(),
            deleted_at: "deletedAt".to_string(),
            is_deleted: "isDeleted".to_string(),
        }
    }
}

impl FieldNames {
    /// Timestamp fields rendered as strings on read
    pub fn timestamps(&self) -> [&str; 3] {
        [
            self.created_at.as_str(),
            self.updated_at.as_str(),
            self.deleted_at.as_str(),
        ]
    }
}

/// Repository configuration
///
/// Every key is optional in YAML; missing keys fall back to the defaults.
///
/// ```yaml
/// fields:
///   created_at: created
/// date_format: "%Y-%m-%dT%H:%M:%S.%LZ"
/// default_limit: 20
/// max_limit: 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudConfig {
    /// Bookkeeping field names
    pub fields: FieldNames,

    /// `$dateToString` format used when rendering timestamps
    pub date_format: String,

    /// Page size used when a request does not name one
    pub default_limit: u64,

    /// Largest page size a request may ask for
    pub max_limit: u64,
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            date_format: "%Y-%m-%dT%H:%M:%S.%LZ".to_string(),
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl CrudConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        if config.max_limit == 0 {
            anyhow::bail!("max_limit must be at least 1");
        }
        Ok(config)
    }
}
