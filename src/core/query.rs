//! Composable filter builder
//!
//! [`QueryBuilder`] accumulates predicate groups (one-or-more field
//! conditions in a [`Document`]) into two ordered lists, an AND-list and an
//! OR-list, and compiles them into a single filter document with
//! [`build`](QueryBuilder::build).
//!
//! # Combination rule
//!
//! | AND-list | OR-list | result                                   |
//! |----------|---------|------------------------------------------|
//! | empty    | empty   | `{}` (matches everything)                |
//! | 1 group  | empty   | the group itself                         |
//! | n groups | empty   | `{"$and": [..]}`                         |
//! | empty    | 1 group | the group itself                         |
//! | empty    | n groups| `{"$or": [..]}`                          |
//! | non-empty| non-empty| `{"$and": [..ands], "$or": [..ors]}`    |
//!
//! The last row requires *all* AND groups and *at least one* OR group. The
//! AND groups are never merged flat with the OR groups.
//!
//! # Example
//!
//! ```rust
//! use crud::core::query::QueryBuilder;
//!
//! let mut q = QueryBuilder::new();
//! q.eq("status", "published")
//!     .gte("views", 100)
//!     .add_search(&["title", "body"], "rust");
//!
//! let filter = q.build();
//! assert!(filter.contains_key("$and"));
//! assert!(filter.contains_key("$or"));
//! ```

use bson::{Bson, Document, doc};

/// Accumulator of AND / OR predicate groups
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    ands: Vec<Document>,
    ors: Vec<Document>,
}

impl QueryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group to the AND-list; empty groups are ignored
    pub fn and(&mut self, group: Document) -> &mut Self {
        if !group.is_empty() {
            self.ands.push(group);
        }
        self
    }

    /// Append a group to the OR-list; empty groups are ignored
    pub fn or(&mut self, group: Document) -> &mut Self {
        if !group.is_empty() {
            self.ors.push(group);
        }
        self
    }

    /// Raw passthrough to [`and`](Self::and)
    pub fn add(&mut self, group: Document) -> &mut Self {
        self.and(group)
    }

    // === Equality ===

    pub fn eq(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(equality(field, value.into()))
    }

    pub fn ne(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(operator(field, "$ne", value.into()))
    }

    // === Comparison ===

    pub fn gt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(operator(field, "$gt", value.into()))
    }

    pub fn gte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(operator(field, "$gte", value.into()))
    }

    pub fn lt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(operator(field, "$lt", value.into()))
    }

    pub fn lte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(operator(field, "$lte", value.into()))
    }

    // === Sets ===

    /// `field` is one of `values`
    pub fn in_values<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.and(operator(field, "$in", bson_array(values)))
    }

    /// `field` is none of `values`
    pub fn not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.and(operator(field, "$nin", bson_array(values)))
    }

    // === Existence, patterns, negation ===

    pub fn exists(&mut self, field: &str, exists: bool) -> &mut Self {
        self.and(operator(field, "$exists", Bson::Boolean(exists)))
    }

    /// Case-insensitive pattern match
    pub fn regex(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.and(regex_group(field, pattern))
    }

    /// `field` is not equal to `value` (also matches a missing field)
    pub fn not(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.and(negation(field, value.into()))
    }

    // === OR variants ===

    pub fn or_eq(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(equality(field, value.into()))
    }

    pub fn or_ne(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(operator(field, "$ne", value.into()))
    }

    pub fn or_gt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(operator(field, "$gt", value.into()))
    }

    pub fn or_gte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(operator(field, "$gte", value.into()))
    }

    pub fn or_lt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(operator(field, "$lt", value.into()))
    }

    pub fn or_lte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(operator(field, "$lte", value.into()))
    }

    pub fn or_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.or(operator(field, "$in", bson_array(values)))
    }

    pub fn or_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.or(operator(field, "$nin", bson_array(values)))
    }

    pub fn or_exists(&mut self, field: &str, exists: bool) -> &mut Self {
        self.or(operator(field, "$exists", Bson::Boolean(exists)))
    }

    pub fn or_regex(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.or(regex_group(field, pattern))
    }

    pub fn or_not(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.or(negation(field, value.into()))
    }

    // === Composite helpers ===

    /// Free-text search of `keyword` across `fields`
    ///
    /// Adds ONE group to the OR-list holding a case-insensitive match per
    /// field. The keyword is matched literally (regex metacharacters are
    /// escaped). No-op when either input is empty.
    pub fn add_search<S: AsRef<str>>(&mut self, fields: &[S], keyword: &str) -> &mut Self {
        if keyword.is_empty() || fields.is_empty() {
            return self;
        }

        let escaped = regex::escape(keyword);
        let alternatives: Vec<Bson> = fields
            .iter()
            .map(|field| Bson::Document(regex_group(field.as_ref(), &escaped)))
            .collect();

        self.or(doc! { "$or": alternatives })
    }

    /// Restrict `field` to the given identifiers; no-op when `ids` is empty
    pub fn add_ids<S: AsRef<str>>(&mut self, field: &str, ids: &[S]) -> &mut Self {
        if ids.is_empty() {
            return self;
        }
        self.in_values(field, ids.iter().map(|id| id.as_ref().to_string()))
    }

    // === Compilation ===

    /// Whether no group has been added
    pub fn is_empty(&self) -> bool {
        self.ands.is_empty() && self.ors.is_empty()
    }

    /// Number of groups in the AND-list
    pub fn and_len(&self) -> usize {
        self.ands.len()
    }

    /// Number of groups in the OR-list
    pub fn or_len(&self) -> usize {
        self.ors.len()
    }

    /// Compile the accumulated groups into one filter document
    ///
    /// Pure: calling it repeatedly without mutation yields equal documents.
    pub fn build(&self) -> Document {
        match (self.ands.as_slice(), self.ors.as_slice()) {
            ([], []) => Document::new(),
            ([single], []) | ([], [single]) => single.clone(),
            (ands, []) => doc! { "$and": to_array(ands) },
            ([], ors) => doc! { "$or": to_array(ors) },
            (ands, ors) => doc! {
                "$and": to_array(ands),
                "$or": to_array(ors),
            },
        }
    }
}

fn equality(field: &str, value: Bson) -> Document {
    let mut group = Document::new();
    group.insert(field, value);
    group
}

fn negation(field: &str, value: Bson) -> Document {
    doc! { field: { "$not": { "$eq": value } } }
}

fn operator(field: &str, op: &str, value: Bson) -> Document {
    let mut condition = Document::new();
    condition.insert(op, value);
    doc! { field: condition }
}

fn regex_group(field: &str, pattern: &str) -> Document {
    doc! { field: { "$regex": pattern, "$options": "i" } }
}

fn bson_array<I, V>(values: I) -> Bson
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    Bson::Array(values.into_iter().map(Into::into).collect())
}

fn to_array(groups: &[Document]) -> Vec<Bson> {
    groups.iter().cloned().map(Bson::Document).collect()
}
