//! Shared test harness for document store testing
//!
//! Provides `Article`, an entity covering scalars, a nested object, an
//! array of objects and an array of scalars, plus helpers for building test
//! data and parsing rendered timestamps.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use crud::prelude::*;
use std::sync::Once;

#[macro_use]
pub mod repository_tests;

// ---------------------------------------------------------------------------
// Article with nested author, tags and keywords
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl_field_object!(Author, [name, email]);

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub label: String,
    pub weight: i64,
}

impl_field_object!(Tag, [label, weight]);

/// A test entity exercising every marshalling shape.
///
/// Timestamps and the archive flag are written by the repository, so they
/// are not part of the schema; they come back as rendered strings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
    pub views: i64,
    pub rating: f64,
    pub published: bool,
    pub author: Author,
    pub tags: Vec<Tag>,
    pub keywords: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub is_deleted: bool,
}

impl_entity!(Article, "articles", id: id, [
    id,
    title,
    body,
    views,
    rating,
    published,
    author,
    tags,
    keywords,
]);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Install a test subscriber once per test binary (`RUST_LOG` controls output)
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Article with a title and a view count
pub fn article(title: &str, views: i64) -> Article {
    Article {
        title: title.to_string(),
        views,
        ..Default::default()
    }
}

/// `count` articles titled `Article 0`, `Article 1`, ... with views 1..=count
pub fn sample_batch(count: usize) -> Vec<Article> {
    (0..count)
        .map(|i| article(&format!("Article {}", i), i as i64 + 1))
        .collect()
}

/// A fully populated article
pub fn rich_article() -> Article {
    Article {
        title: "Ownership in practice".to_string(),
        body: "Borrowing rules explained".to_string(),
        views: 120,
        rating: 4.5,
        published: true,
        author: Author {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        },
        tags: vec![
            Tag {
                label: "rust".to_string(),
                weight: 3,
            },
            Tag {
                label: "memory".to_string(),
                weight: 1,
            },
        ],
        keywords: vec!["borrow".to_string(), "lifetime".to_string()],
        ..Default::default()
    }
}

/// Parse a timestamp rendered with the default date format
pub fn parse_stamp(rendered: &Option<String>) -> DateTime<Utc> {
    let raw = rendered.as_deref().expect("timestamp should be set");
    DateTime::parse_from_rfc3339(raw)
        .unwrap_or_else(|e| panic!("timestamp {raw:?} is not RFC 3339: {e}"))
        .with_timezone(&Utc)
}

/// Whether a timestamp is rendered exactly as `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn is_canonical_stamp(rendered: &str) -> bool {
    let bytes = rendered.as_bytes();
    rendered.len() == 24
        && bytes[4] == b'-'
        && bytes[10] == b'T'
        && bytes[19] == b'.'
        && rendered.ends_with('Z')
        && DateTime::parse_from_rfc3339(rendered).is_ok()
}

/// Sleep long enough for millisecond timestamps to move forward
pub async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}
