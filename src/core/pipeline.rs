//! Aggregation stage builders used by the listing engine
//!
//! A paginated listing is a single aggregation:
//!
//! ```text
//! [$match]? → caller stages* → $facet{data: sort/skip/limit, total: count} → $addFields(date strings)
//! ```
//!
//! `data` and `total` are computed by the same `$facet` over the same matched
//! set, so the page and the total always agree.

use crate::core::error::{CrudError, Result};
use bson::{Bson, Document, doc};
use serde::Deserialize;

/// An ordered list of aggregation stages
pub type Pipeline = Vec<Document>;

/// `{"$match": filter}`
pub fn match_stage(filter: Document) -> Document {
    doc! { "$match": filter }
}

/// Sort specification for a single field
pub fn sort_spec(field: &str, descending: bool) -> Document {
    let mut spec = Document::new();
    spec.insert(field, if descending { -1 } else { 1 });
    spec
}

/// `[{$skip}, {$limit}]`; a zero limit means "no limit" and emits no stage
pub fn paginate(skip: u64, limit: u64) -> Pipeline {
    let mut stages = vec![doc! { "$skip": to_i64(skip) }];
    if limit > 0 {
        stages.push(doc! { "$limit": to_i64(limit) });
    }
    stages
}

/// `$facet` stage computing one page (`data`) and the total count (`total`)
pub fn facet_data_total(sort: Document, skip: u64, limit: u64) -> Document {
    let mut data: Vec<Bson> = vec![Bson::Document(doc! { "$sort": sort })];
    data.extend(paginate(skip, limit).into_iter().map(Bson::Document));

    doc! {
        "$facet": {
            "data": data,
            "total": [ { "$count": "count" } ],
        }
    }
}

/// Expression rendering `path` as a string with `format` when it holds a date
///
/// Non-date values (including a missing field) evaluate to themselves, so a
/// record without a deletion timestamp keeps it absent.
pub fn date_to_string(path: &str, format: &str) -> Bson {
    Bson::Document(doc! {
        "$cond": [
            { "$eq": [ { "$type": path }, "date" ] },
            { "$dateToString": { "format": format, "date": path } },
            path,
        ]
    })
}

/// Append one `$addFields` stage per field, rendering top-level dates as strings
pub fn named_date_conversions(mut pipeline: Pipeline, fields: &[&str], format: &str) -> Pipeline {
    for field in fields {
        let mut set = Document::new();
        set.insert(*field, date_to_string(&format!("${}", field), format));
        pipeline.push(doc! { "$addFields": set });
    }
    pipeline
}

/// Append an `$addFields` stage rewriting the date fields of every element of
/// the `array_field` array
pub fn array_date_conversion(
    mut pipeline: Pipeline,
    array_field: &str,
    fields: &[&str],
    format: &str,
) -> Pipeline {
    let mut converted = Document::new();
    for field in fields {
        converted.insert(*field, date_to_string(&format!("$$item.{}", field), format));
    }

    let mut set = Document::new();
    set.insert(
        array_field,
        doc! {
            "$map": {
                "input": format!("${}", array_field),
                "as": "item",
                "in": { "$mergeObjects": [ "$$item", converted ] },
            }
        },
    );
    pipeline.push(doc! { "$addFields": set });
    pipeline
}

/// Render a date with a `$dateToString`-style format
///
/// Supports the chrono specifiers plus `%L` (milliseconds).
pub fn format_date(date: bson::DateTime, format: &str) -> String {
    let chrono_format = format.replace("%L", "%3f");
    date.to_chrono().format(&chrono_format).to_string()
}

/// Rewrite top-level date fields of `doc` to strings, in process
///
/// Used for reads that do not go through an aggregation (direct `find`).
pub fn canonicalize_dates(doc: &mut Document, fields: &[&str], format: &str) {
    for field in fields {
        if let Some(Bson::DateTime(date)) = doc.get(*field) {
            let rendered = format_date(*date, format);
            doc.insert(*field, rendered);
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacetRow {
    #[serde(default)]
    data: Vec<Document>,
    #[serde(default)]
    total: Vec<TotalCount>,
}

#[derive(Debug, Deserialize)]
struct TotalCount {
    #[serde(default)]
    count: i64,
}

/// Unpack the rows produced by [`facet_data_total`]
///
/// No row yields `([], 0)`; a row without a count yields a total of 0.
pub fn parse_page_result(rows: Vec<Document>, collection: &str) -> Result<(Vec<Document>, u64)> {
    let Some(first) = rows.into_iter().next() else {
        return Ok((Vec::new(), 0));
    };

    let row: FacetRow = bson::from_document(first).map_err(|source| CrudError::Decode {
        collection: collection.to_string(),
        source,
    })?;

    let total = row
        .total
        .first()
        .map(|t| u64::try_from(t.count).unwrap_or(0))
        .unwrap_or(0);

    Ok((row.data, total))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
