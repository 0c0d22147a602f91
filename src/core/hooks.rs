//! Write-time bookkeeping: identifiers, timestamps, soft-delete markers

use crate::config::FieldNames;
use bson::{Bson, Document, doc};
use chrono::{DateTime, Utc};
use uuid::Uuid;

fn bson_now(now: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(now))
}

/// Stamp a document about to be inserted
///
/// Assigns a UUID v4 identifier unless the document already carries one, and
/// sets creation and update timestamps to the same instant.
pub fn before_insert(record: &mut Document, fields: &FieldNames, now: DateTime<Utc>) {
    let has_id = matches!(record.get(&fields.id), Some(Bson::String(id)) if !id.is_empty());
    if !has_id {
        record.insert(fields.id.clone(), Uuid::new_v4().to_string());
    }
    record.insert(fields.created_at.clone(), bson_now(now));
    record.insert(fields.updated_at.clone(), bson_now(now));
}

/// Stamp an update document with a fresh update timestamp
///
/// The timestamp is merged into an existing `$set`, or a `$set` is created.
pub fn before_update(update: &mut Document, fields: &FieldNames, now: DateTime<Utc>) {
    match update.get_mut("$set") {
        Some(Bson::Document(set)) => {
            set.insert(fields.updated_at.clone(), bson_now(now));
        }
        _ => {
            let mut set = Document::new();
            set.insert(fields.updated_at.clone(), bson_now(now));
            update.insert("$set", set);
        }
    }
}

/// Update document marking a record as archived
pub fn archive_update(fields: &FieldNames, now: DateTime<Utc>) -> Document {
    let mut set = Document::new();
    set.insert(fields.is_deleted.clone(), true);
    set.insert(fields.deleted_at.clone(), bson_now(now));
    doc! { "$set": set }
}

/// Update document clearing the archive markers
pub fn restore_update(fields: &FieldNames) -> Document {
    let mut unset = Document::new();
    unset.insert(fields.is_deleted.clone(), "");
    unset.insert(fields.deleted_at.clone(), "");
    doc! { "$unset": unset }
}
