//! Field values and the entity marshaller
//!
//! Entities describe their fields explicitly through [`FieldDescriptor`]s
//! (usually generated by [`impl_entity!`](crate::impl_entity)). The
//! marshaller walks those descriptors and produces a flat field → value
//! document:
//!
//! - fields holding their type's zero value (`""`, `0`, `false`, `None`,
//!   empty vectors, nil UUIDs, the default timestamp) are dropped
//! - nested objects are flattened into dotted keys (`author.name`)
//! - arrays whose items are all objects are flattened by index
//!   (`tags.0.label`); arrays of scalars are kept as arrays
//!
//! The flat document is used as a `$set` body and as a "match every
//! non-empty field" filter template. Inserts use [`to_document`], which drops
//! the same zero values but keeps the nesting.

use crate::core::entity::Entity;
use crate::core::error::{CrudError, Result};
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Object(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::UnsignedInteger(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Check if the value is its type's zero value
    ///
    /// Objects are zero when every member is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Integer(i) => *i == 0,
            FieldValue::UnsignedInteger(u) => *u == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Boolean(b) => !*b,
            FieldValue::Uuid(u) => u.is_nil(),
            FieldValue::DateTime(dt) => *dt == DateTime::<Utc>::default(),
            FieldValue::Array(items) => items.is_empty(),
            FieldValue::Object(fields) => fields.iter().all(|(_, v)| v.is_zero()),
        }
    }

    fn is_object(&self) -> bool {
        matches!(self, FieldValue::Object(_))
    }

    /// Convert into a BSON value, keeping zero members of nested values
    ///
    /// `path` is only used to report which field failed.
    pub fn into_bson(self, path: &str) -> Result<Bson> {
        Ok(match self {
            FieldValue::Null => Bson::Null,
            FieldValue::String(s) => Bson::String(s),
            FieldValue::Integer(i) => Bson::Int64(i),
            FieldValue::UnsignedInteger(u) => Bson::Int64(
                i64::try_from(u)
                    .map_err(|_| CrudError::marshal(path, format!("value {} overflows i64", u)))?,
            ),
            FieldValue::Float(f) => Bson::Double(f),
            FieldValue::Boolean(b) => Bson::Boolean(b),
            FieldValue::Uuid(u) => Bson::String(u.to_string()),
            FieldValue::DateTime(dt) => Bson::DateTime(bson::DateTime::from_chrono(dt)),
            FieldValue::Array(items) => Bson::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| item.into_bson(&format!("{}.{}", path, i)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            FieldValue::Object(fields) => {
                let mut doc = Document::new();
                for (key, value) in fields {
                    let bson = value.into_bson(&format!("{}.{}", path, key))?;
                    doc.insert(key, bson);
                }
                Bson::Document(doc)
            }
        })
    }
}

/// Conversion of a Rust value into a [`FieldValue`]
///
/// Implemented for the common scalar types, `Option`, `Vec` and the types
/// declared with [`impl_field_object!`](crate::impl_field_object).
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

macro_rules! to_field_value_signed {
    ($($t:ty),*) => {
        $(impl ToFieldValue for $t {
            fn to_field_value(&self) -> FieldValue {
                FieldValue::Integer(i64::from(*self))
            }
        })*
    };
}

macro_rules! to_field_value_unsigned {
    ($($t:ty),*) => {
        $(impl ToFieldValue for $t {
            fn to_field_value(&self) -> FieldValue {
                FieldValue::UnsignedInteger(u64::from(*self))
            }
        })*
    };
}

to_field_value_signed!(i8, i16, i32, i64);
to_field_value_unsigned!(u8, u16, u32, u64);

impl ToFieldValue for usize {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::UnsignedInteger(*self as u64)
    }
}

impl ToFieldValue for f32 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }
}

impl ToFieldValue for f64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
}

impl ToFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Boolean(*self)
    }
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }
}

impl ToFieldValue for &str {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String((*self).to_string())
    }
}

impl ToFieldValue for Uuid {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Uuid(*self)
    }
}

impl ToFieldValue for DateTime<Utc> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }
}

impl ToFieldValue for FieldValue {
    fn to_field_value(&self) -> FieldValue {
        self.clone()
    }
}

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(value) => value.to_field_value(),
            None => FieldValue::Null,
        }
    }
}

impl<T: ToFieldValue> ToFieldValue for Vec<T> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Array(self.iter().map(ToFieldValue::to_field_value).collect())
    }
}

/// Name and accessor of one entity field
pub struct FieldDescriptor<T> {
    /// Stored field name (must match the entity's serde name)
    pub name: &'static str,
    /// Reads the field off an entity
    pub get: fn(&T) -> FieldValue,
}

impl<T> FieldDescriptor<T> {
    pub fn new(name: &'static str, get: fn(&T) -> FieldValue) -> Self {
        Self { name, get }
    }

    /// Read this field from `entity`
    pub fn value(&self, entity: &T) -> FieldValue {
        (self.get)(entity)
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Marshal an entity into a flat field map, dropping zero-valued fields
pub fn to_field_map<T: Entity>(entity: &T) -> Result<Document> {
    let mut map = Document::new();
    for descriptor in T::schema() {
        flatten_into(&mut map, descriptor.name.to_string(), descriptor.value(entity))?;
    }
    Ok(map)
}

/// Marshal an entity into a nested document, dropping zero-valued fields
///
/// Used as the insert payload: nested objects stay documents and arrays of
/// objects stay arrays (elements keep their position even when empty).
pub fn to_document<T: Entity>(entity: &T) -> Result<Document> {
    let mut doc = Document::new();
    for descriptor in T::schema() {
        let value = descriptor.value(entity);
        if let Some(bson) = prune(value, descriptor.name)? {
            doc.insert(descriptor.name, bson);
        }
    }
    Ok(doc)
}

fn prune(value: FieldValue, path: &str) -> Result<Option<Bson>> {
    if value.is_zero() {
        return Ok(None);
    }
    match value {
        FieldValue::Object(fields) => Ok(Some(Bson::Document(prune_members(fields, path)?))),
        FieldValue::Array(items) => {
            let mut array = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let item_path = format!("{}.{}", path, index);
                array.push(match item {
                    FieldValue::Object(fields) => {
                        Bson::Document(prune_members(fields, &item_path)?)
                    }
                    other => other.into_bson(&item_path)?,
                });
            }
            Ok(Some(Bson::Array(array)))
        }
        other => other.into_bson(path).map(Some),
    }
}

fn prune_members(fields: Vec<(String, FieldValue)>, path: &str) -> Result<Document> {
    let mut doc = Document::new();
    for (key, member) in fields {
        let member_path = format!("{}.{}", path, key);
        if let Some(bson) = prune(member, &member_path)? {
            doc.insert(key, bson);
        }
    }
    Ok(doc)
}

fn flatten_into(map: &mut Document, path: String, value: FieldValue) -> Result<()> {
    if value.is_zero() {
        return Ok(());
    }

    match value {
        FieldValue::Object(fields) => {
            for (key, member) in fields {
                flatten_into(map, format!("{}.{}", path, key), member)?;
            }
        }
        FieldValue::Array(items) if items.iter().all(FieldValue::is_object) => {
            for (index, item) in items.into_iter().enumerate() {
                flatten_into(map, format!("{}.{}", path, index), item)?;
            }
        }
        other => {
            let bson = other.into_bson(&path)?;
            map.insert(path, bson);
        }
    }
    Ok(())
}
