//! Query-document evaluation and update application for the in-memory store

use super::values::{compare_values, resolve_path, set_path, unset_path, values_equal};
use crate::core::error::{CrudError, Result};
use bson::{Bson, Document, Regex as BsonRegex};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// Whether `record` satisfies `filter`
pub fn matches(record: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(record, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_clause(record, key, condition)?,
            "$nor" => !any_clause(record, key, condition)?,
            op if op.starts_with('$') => return Err(CrudError::unsupported(op, "filter")),
            path => matches_field(record, path, condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, value: &'a Bson) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = value else {
        return Err(invalid(operator, "expects an array of documents"));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(invalid(operator, "expects an array of documents")),
        })
        .collect()
}

fn any_clause(record: &Document, operator: &str, value: &Bson) -> Result<bool> {
    for clause in clauses(operator, value)? {
        if matches(record, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_field(record: &Document, path: &str, condition: &Bson) -> Result<bool> {
    let candidates = resolve_path(record, path);
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => matches_operators(&candidates, ops),
        Bson::RegularExpression(pattern) => {
            let regex = compile_bson_regex(pattern)?;
            Ok(any_string_matches(&candidates, &regex))
        }
        value => Ok(equals_any(&candidates, value)),
    }
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn matches_operators(candidates: &[Bson], ops: &Document) -> Result<bool> {
    for (op, operand) in ops {
        let satisfied = match op.as_str() {
            "$eq" => equals_any(candidates, operand),
            "$ne" => !equals_any(candidates, operand),
            "$gt" => compares_any(candidates, operand, |o| o == Ordering::Greater),
            "$gte" => compares_any(candidates, operand, |o| o != Ordering::Less),
            "$lt" => compares_any(candidates, operand, |o| o == Ordering::Less),
            "$lte" => compares_any(candidates, operand, |o| o != Ordering::Greater),
            "$in" => in_any(candidates, op, operand)?,
            "$nin" => !in_any(candidates, op, operand)?,
            "$exists" => !candidates.is_empty() == is_set(operand),
            "$regex" => {
                let regex = compile_operator_regex(operand, ops.get("$options"))?;
                any_string_matches(candidates, &regex)
            }
            "$options" if ops.contains_key("$regex") => true,
            "$not" => !negated(candidates, operand)?,
            other => return Err(CrudError::unsupported(other, "filter")),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn negated(candidates: &[Bson], operand: &Bson) -> Result<bool> {
    match operand {
        Bson::Document(inner) if is_operator_document(inner) => {
            matches_operators(candidates, inner)
        }
        Bson::RegularExpression(pattern) => {
            let regex = compile_bson_regex(pattern)?;
            Ok(any_string_matches(candidates, &regex))
        }
        _ => Err(invalid("$not", "expects an operator document or a regex")),
    }
}

/// Values a candidate contributes to a comparison: itself plus, for an
/// array, each of its elements
fn expanded(candidates: &[Bson]) -> impl Iterator<Item = &Bson> {
    candidates.iter().flat_map(|candidate| {
        let elements: &[Bson] = match candidate {
            Bson::Array(items) => items,
            _ => &[],
        };
        std::iter::once(candidate).chain(elements.iter())
    })
}

fn equals_any(candidates: &[Bson], value: &Bson) -> bool {
    if matches!(value, Bson::Null) && candidates.is_empty() {
        return true;
    }
    expanded(candidates).any(|candidate| values_equal(candidate, value))
}

fn compares_any(candidates: &[Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    expanded(candidates)
        .filter(|candidate| !matches!(candidate, Bson::Array(_)))
        .any(|candidate| compare_values(candidate, operand).is_some_and(&accept))
}

fn in_any(candidates: &[Bson], op: &str, operand: &Bson) -> Result<bool> {
    let Bson::Array(values) = operand else {
        return Err(invalid(op, "expects an array"));
    };
    for value in values {
        let hit = match value {
            Bson::RegularExpression(pattern) => {
                any_string_matches(candidates, &compile_bson_regex(pattern)?)
            }
            other => equals_any(candidates, other),
        };
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_set(operand: &Bson) -> bool {
    match operand {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn any_string_matches(candidates: &[Bson], regex: &Regex) -> bool {
    expanded(candidates).any(|candidate| match candidate {
        Bson::String(s) => regex.is_match(s),
        _ => false,
    })
}

fn compile_operator_regex(pattern: &Bson, options: Option<&Bson>) -> Result<Regex> {
    let options = match options {
        Some(Bson::String(opts)) => opts.as_str(),
        Some(_) => return Err(invalid("$options", "expects a string")),
        None => "",
    };
    match pattern {
        Bson::String(p) => compile_regex(p, options),
        Bson::RegularExpression(r) if options.is_empty() => compile_bson_regex(r),
        Bson::RegularExpression(r) => compile_regex(&r.pattern, options),
        _ => Err(invalid("$regex", "expects a string or a regex")),
    }
}

fn compile_bson_regex(regex: &BsonRegex) -> Result<Regex> {
    compile_regex(&regex.pattern, &regex.options)
}

fn compile_regex(pattern: &str, options: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(CrudError::unsupported(format!("$options '{}'", other), "filter")),
        };
    }
    builder
        .build()
        .map_err(|e| invalid("$regex", &e.to_string()))
}

fn invalid(operator: &str, message: &str) -> CrudError {
    CrudError::unsupported(format!("{} ({})", operator, message), "filter")
}

/// Apply a `$set` / `$unset` update document to `record`
pub fn apply_update(record: &mut Document, update: &Document) -> Result<()> {
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(CrudError::unsupported(op.as_str(), "update"));
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(record, path, value.clone());
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    unset_path(record, path);
                }
            }
            other => return Err(CrudError::unsupported(other, "update")),
        }
    }
    Ok(())
}
