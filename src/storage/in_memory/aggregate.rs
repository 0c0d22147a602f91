//! Aggregation pipeline evaluation for the in-memory store
//!
//! Covers the stages and expressions the repository emits plus the common
//! shaping stages callers add through a pipeline hook. Anything else fails
//! with [`CrudError::Unsupported`] rather than being silently ignored.

use super::matcher;
use super::values::{
    as_count, get_path, is_truthy, set_path, sort_order, type_name, unset_path, values_equal,
};
use crate::core::error::{CrudError, Result};
use crate::core::pipeline::format_date;
use bson::{Bson, Document};
use std::collections::HashMap;

/// Run `pipeline` over `records`
pub fn run(records: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    let mut current = records;
    for stage in pipeline {
        current = run_stage(current, stage)?;
    }
    Ok(current)
}

fn run_stage(records: Vec<Document>, stage: &Document) -> Result<Vec<Document>> {
    let mut entries = stage.iter();
    let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
        return Err(CrudError::unsupported(
            "stage with other than one operator",
            "pipeline",
        ));
    };

    match (name.as_str(), spec) {
        ("$match", Bson::Document(filter)) => {
            let mut kept = Vec::with_capacity(records.len());
            for record in records {
                if matcher::matches(&record, filter)? {
                    kept.push(record);
                }
            }
            Ok(kept)
        }
        ("$sort", Bson::Document(keys)) => sort(records, keys),
        ("$skip", value) => {
            let skip = stage_count(name, value)?;
            Ok(records.into_iter().skip(skip).collect())
        }
        ("$limit", value) => {
            let limit = stage_count(name, value)?;
            Ok(records.into_iter().take(limit).collect())
        }
        ("$count", Bson::String(field)) => {
            if records.is_empty() {
                return Ok(Vec::new());
            }
            let mut row = Document::new();
            row.insert(field.as_str(), count_value(records.len()));
            Ok(vec![row])
        }
        ("$facet", Bson::Document(facets)) => {
            let mut row = Document::new();
            for (facet, sub_pipeline) in facets {
                let Bson::Array(raw) = sub_pipeline else {
                    return Err(CrudError::unsupported("$facet entry", "pipeline"));
                };
                let stages = raw
                    .iter()
                    .map(|stage| match stage {
                        Bson::Document(doc) => Ok(doc.clone()),
                        _ => Err(CrudError::unsupported("$facet entry", "pipeline")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let output = run(records.clone(), &stages)?;
                row.insert(
                    facet.as_str(),
                    Bson::Array(output.into_iter().map(Bson::Document).collect()),
                );
            }
            Ok(vec![row])
        }
        ("$addFields" | "$set", Bson::Document(fields)) => records
            .into_iter()
            .map(|record| add_fields(record, fields))
            .collect(),
        ("$project", Bson::Document(projection)) => records
            .into_iter()
            .map(|record| project(record, projection))
            .collect(),
        (other, _) => Err(CrudError::unsupported(other, "pipeline")),
    }
}

fn stage_count(name: &str, value: &Bson) -> Result<usize> {
    as_count(value)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CrudError::unsupported(format!("{} {}", name, value), "pipeline"))
}

fn count_value(count: usize) -> Bson {
    match i32::try_from(count) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(count).unwrap_or(i64::MAX)),
    }
}

fn sort(mut records: Vec<Document>, keys: &Document) -> Result<Vec<Document>> {
    let mut order = Vec::with_capacity(keys.len());
    for (field, direction) in keys {
        let descending = match as_direction(direction) {
            Some(descending) => descending,
            None => {
                return Err(CrudError::unsupported(
                    format!("$sort direction {}", direction),
                    "pipeline",
                ));
            }
        };
        order.push((field.as_str(), descending));
    }

    records.sort_by(|a, b| {
        order
            .iter()
            .map(|(field, descending)| {
                let ordering = sort_order(get_path(a, field), get_path(b, field));
                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(records)
}

fn as_direction(value: &Bson) -> Option<bool> {
    match value {
        Bson::Int32(1) | Bson::Int64(1) => Some(false),
        Bson::Int32(-1) | Bson::Int64(-1) => Some(true),
        Bson::Double(d) if *d == 1.0 => Some(false),
        Bson::Double(d) if *d == -1.0 => Some(true),
        _ => None,
    }
}

fn add_fields(mut record: Document, fields: &Document) -> Result<Document> {
    let vars = Vars::default();
    let mut computed = Vec::with_capacity(fields.len());
    for (path, expression) in fields {
        computed.push((path, evaluate(expression, &record, &vars)?));
    }
    for (path, value) in computed {
        match value {
            Some(value) => set_path(&mut record, path, value),
            None => unset_path(&mut record, path),
        }
    }
    Ok(record)
}

fn project(record: Document, projection: &Document) -> Result<Document> {
    let mut include_id = true;
    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    let mut computed = Vec::new();

    for (path, spec) in projection {
        match projection_flag(spec) {
            Some(include) => classify(path, include, &mut include_id, &mut includes, &mut excludes),
            None => computed.push((path.as_str(), spec)),
        }
    }

    if !excludes.is_empty() && (!includes.is_empty() || !computed.is_empty()) {
        return Err(CrudError::unsupported(
            "$project mixing inclusion and exclusion",
            "pipeline",
        ));
    }

    if !excludes.is_empty() || (includes.is_empty() && computed.is_empty()) {
        let mut output = record;
        for path in excludes {
            unset_path(&mut output, path);
        }
        if !include_id {
            output.remove("_id");
        }
        return Ok(output);
    }

    let mut output = Document::new();
    if include_id && let Some(id) = record.get("_id") {
        output.insert("_id", id.clone());
    }
    for path in includes {
        if let Some(value) = get_path(&record, path) {
            set_path(&mut output, path, value.clone());
        }
    }
    let vars = Vars::default();
    for (path, expression) in computed {
        if let Some(value) = evaluate(expression, &record, &vars)? {
            set_path(&mut output, path, value);
        }
    }
    Ok(output)
}

fn projection_flag(spec: &Bson) -> Option<bool> {
    match spec {
        Bson::Boolean(flag) => Some(*flag),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(n) => Some(*n != 0.0),
        _ => None,
    }
}

fn classify<'a>(
    path: &'a str,
    include: bool,
    include_id: &mut bool,
    includes: &mut Vec<&'a str>,
    excludes: &mut Vec<&'a str>,
) {
    if path == "_id" {
        *include_id = include;
    } else if include {
        includes.push(path);
    } else {
        excludes.push(path);
    }
}

// === Expressions ===

type Vars = HashMap<String, Bson>;

/// Evaluate an aggregation expression against `root`
///
/// `None` stands for a missing value, which `$addFields` turns into an
/// absent field.
fn evaluate(expression: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    match expression {
        Bson::String(s) if s.starts_with("$$") => Ok(variable(&s[2..], root, vars)),
        Bson::String(s) if s.starts_with('$') => Ok(get_path(root, &s[1..]).cloned()),
        Bson::Document(doc) => {
            let mut entries = doc.iter();
            match (entries.next(), entries.next()) {
                (Some((op, operand)), None) if op.starts_with('$') => {
                    operator(op, operand, root, vars)
                }
                _ => {
                    let mut object = Document::new();
                    for (key, value) in doc {
                        if let Some(value) = evaluate(value, root, vars)? {
                            object.insert(key.as_str(), value);
                        }
                    }
                    Ok(Some(Bson::Document(object)))
                }
            }
        }
        Bson::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(item, root, vars)?.unwrap_or(Bson::Null));
            }
            Ok(Some(Bson::Array(values)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn variable(reference: &str, root: &Document, vars: &Vars) -> Option<Bson> {
    let (name, path) = match reference.split_once('.') {
        Some((name, path)) => (name, Some(path)),
        None => (reference, None),
    };
    let base = match name {
        "ROOT" | "CURRENT" => Bson::Document(root.clone()),
        other => vars.get(other)?.clone(),
    };
    match (path, base) {
        (None, base) => Some(base),
        (Some(path), Bson::Document(doc)) => get_path(&doc, path).cloned(),
        (Some(_), _) => None,
    }
}

fn operator(op: &str, operand: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    match op {
        "$literal" => Ok(Some(operand.clone())),
        "$map" => map(operand, root, vars),
        "$mergeObjects" => merge_objects(operand, root, vars),
        "$dateToString" => date_to_string(operand, root, vars),
        "$cond" => cond(operand, root, vars),
        "$eq" => {
            let [left, right] = arguments::<2>(op, operand)?;
            let left = evaluate(left, root, vars)?;
            let right = evaluate(right, root, vars)?;
            let equal = match (&left, &right) {
                (None, None) => true,
                (Some(l), Some(r)) => values_equal(l, r),
                _ => false,
            };
            Ok(Some(Bson::Boolean(equal)))
        }
        "$type" => {
            let target = match operand {
                Bson::Array(items) if items.len() == 1 => &items[0],
                other => other,
            };
            let value = evaluate(target, root, vars)?;
            Ok(Some(Bson::String(type_name(value.as_ref()).to_string())))
        }
        "$ifNull" => {
            let Bson::Array(items) = operand else {
                return Err(CrudError::unsupported("$ifNull without array", "expression"));
            };
            let Some((replacement, candidates)) = items.split_last() else {
                return Err(CrudError::unsupported("$ifNull without arguments", "expression"));
            };
            for candidate in candidates {
                match evaluate(candidate, root, vars)? {
                    None | Some(Bson::Null) | Some(Bson::Undefined) => continue,
                    found => return Ok(found),
                }
            }
            evaluate(replacement, root, vars)
        }
        other => Err(CrudError::unsupported(other, "expression")),
    }
}

fn arguments<'a, const N: usize>(op: &str, operand: &'a Bson) -> Result<[&'a Bson; N]> {
    let Bson::Array(items) = operand else {
        return Err(CrudError::unsupported(format!("{} without array", op), "expression"));
    };
    let refs: Vec<&'a Bson> = items.iter().collect();
    refs.try_into().map_err(|_| {
        CrudError::unsupported(format!("{} with other than {} arguments", op, N), "expression")
    })
}

fn named<'a>(spec: &'a Document, key: &str) -> Option<&'a Bson> {
    spec.get(key)
}

fn map(operand: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    let Bson::Document(spec) = operand else {
        return Err(CrudError::unsupported("$map without document", "expression"));
    };
    let (Some(input), Some(body)) = (named(spec, "input"), named(spec, "in")) else {
        return Err(CrudError::unsupported("$map without input or in", "expression"));
    };
    let alias = match named(spec, "as") {
        Some(Bson::String(name)) => name.as_str(),
        Some(_) => return Err(CrudError::unsupported("$map as", "expression")),
        None => "this",
    };

    let items = match evaluate(input, root, vars)? {
        None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
        Some(Bson::Array(items)) => items,
        Some(other) => {
            return Err(CrudError::unsupported(
                format!("$map over {}", type_name(Some(&other))),
                "expression",
            ));
        }
    };

    let mut scope = vars.clone();
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        scope.insert(alias.to_string(), item);
        mapped.push(evaluate(body, root, &scope)?.unwrap_or(Bson::Null));
    }
    Ok(Some(Bson::Array(mapped)))
}

fn merge_objects(operand: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    let parts: Vec<&Bson> = match operand {
        Bson::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut merged = Document::new();
    for part in parts {
        match evaluate(part, root, vars)? {
            None | Some(Bson::Null) => {}
            Some(Bson::Document(doc)) => {
                for (key, value) in doc {
                    merged.insert(key, value);
                }
            }
            Some(other) => {
                return Err(CrudError::unsupported(
                    format!("$mergeObjects of {}", type_name(Some(&other))),
                    "expression",
                ));
            }
        }
    }
    Ok(Some(Bson::Document(merged)))
}

fn date_to_string(operand: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    let Bson::Document(spec) = operand else {
        return Err(CrudError::unsupported("$dateToString without document", "expression"));
    };
    if spec.contains_key("timezone") {
        return Err(CrudError::unsupported("$dateToString timezone", "expression"));
    }
    let Some(date) = named(spec, "date") else {
        return Err(CrudError::unsupported("$dateToString without date", "expression"));
    };

    match evaluate(date, root, vars)? {
        Some(Bson::DateTime(value)) => {
            let format = match named(spec, "format") {
                Some(Bson::String(format)) => format.as_str(),
                None => "%Y-%m-%dT%H:%M:%S.%LZ",
                Some(_) => {
                    return Err(CrudError::unsupported("$dateToString format", "expression"));
                }
            };
            Ok(Some(Bson::String(format_date(value, format))))
        }
        None | Some(Bson::Null) => match named(spec, "onNull") {
            Some(fallback) => evaluate(fallback, root, vars),
            None => Ok(Some(Bson::Null)),
        },
        Some(other) => Err(CrudError::unsupported(
            format!("$dateToString of {}", type_name(Some(&other))),
            "expression",
        )),
    }
}

fn cond(operand: &Bson, root: &Document, vars: &Vars) -> Result<Option<Bson>> {
    let (condition, then, otherwise) = match operand {
        Bson::Array(_) => {
            let [condition, then, otherwise] = arguments::<3>("$cond", operand)?;
            (condition, then, otherwise)
        }
        Bson::Document(spec) => match (named(spec, "if"), named(spec, "then"), named(spec, "else")) {
            (Some(condition), Some(then), Some(otherwise)) => (condition, then, otherwise),
            _ => return Err(CrudError::unsupported("$cond without if/then/else", "expression")),
        },
        _ => return Err(CrudError::unsupported("$cond", "expression")),
    };

    let test = evaluate(condition, root, vars)?;
    if is_truthy(test.as_ref()) {
        evaluate(then, root, vars)
    } else {
        evaluate(otherwise, root, vars)
    }
}
