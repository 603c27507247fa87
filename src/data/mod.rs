//! Record storage collaborator
//!
//! The engine never talks to a concrete database. Everything goes through
//! [`DataAccess`], which deals in loosely-typed JSON records so the host can
//! map them onto whatever schema it owns.

mod json_file;
mod memory;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::error::DataError;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Record identity assigned by the store
pub type RecordId = u64;

/// A stored record: field name to JSON value. Always carries `id` when read back.
pub type Record = serde_json::Map<String, Value>;

/// Entity kinds the engine reads and writes
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Document,
    Region,
    Category,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Region => "region",
            Self::Category => "category",
        })
    }
}

/// Record filter; a list of filters is a conjunction
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn any_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Eq(field, value) => record.get(field).is_some_and(|v| values_equal(v, value)),
            Self::In(field, values) => record
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
        }
    }
}

/// Sort order for `list`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        if self.ascending { ord } else { ord.reverse() }
    }
}

/// Generic data-access interface over the host's record store
pub trait DataAccess {
    fn list(
        &self,
        entity: Entity,
        filter: &[Filter],
        fields: &[&str],
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DataError>;

    fn get(&self, entity: Entity, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>, DataError>;

    fn create(&mut self, entity: Entity, fields: Record) -> Result<RecordId, DataError>;

    fn update(&mut self, entity: Entity, ids: &[RecordId], fields: Record) -> Result<(), DataError>;

    fn delete(&mut self, entity: Entity, ids: &[RecordId]) -> Result<(), DataError>;
}

/// Keep only the requested fields (plus `id`); an empty list keeps everything
#[must_use]
pub fn project(record: &Record, fields: &[&str]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(key, _)| key.as_str() == "id" || fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn record_id(record: &Record) -> Option<RecordId> {
    field_u64(record, "id")
}

pub fn field_u64(record: &Record, field: &str) -> Option<u64> {
    match record.get(field)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        _ => None,
    }
}

pub fn field_f64(record: &Record, field: &str) -> Option<f64> {
    record.get(field)?.as_f64()
}

pub fn field_bool(record: &Record, field: &str) -> bool {
    record.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// String field; empty strings and `false` (the storage "unset" marker) are `None`
pub fn field_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
