//! Native in-memory values held by model instances.
//!
//! [`Value`] is the closed set of native representations a field can hold. Field descriptors
//! convert between a `Value` and its stored BSON form; the generic [`Value::to_bson`] and
//! [`Value::from_bson`] conversions are used where no field descriptor applies (list and map
//! payloads, sub-field filters, array membership filters).

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::Instance,
};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A native field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value. Absent and null are the same thing.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    GeoPoint(GeoPoint),
    /// A resolved reference to another model instance.
    Reference(Box<Instance>),
}

impl Value {
    /// Short name of the native kind, used in type error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::GeoPoint(_) => "geo_point",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_geo_point(&self) -> Option<&GeoPoint> {
        match self {
            Value::GeoPoint(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Instance> {
        match self {
            Value::Reference(value) => Some(value),
            _ => None,
        }
    }

    /// Truthiness: null, `false`, zero, and empty strings/lists/maps are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::List(value) => !value.is_empty(),
            Value::Map(value) => !value.is_empty(),
            Value::Timestamp(_) | Value::GeoPoint(_) | Value::Reference(_) => true,
        }
    }

    /// Converts the value into BSON without any field-specific coercion.
    ///
    /// References are encoded as their slash-joined document path and therefore need a
    /// persisted target.
    pub fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(match self {
            Value::Null => Bson::Null,
            Value::Bool(value) => Bson::Boolean(*value),
            Value::Int(value) => Bson::Int64(*value),
            Value::Float(value) => Bson::Double(*value),
            Value::String(value) => Bson::String(value.clone()),
            Value::Timestamp(value) => Bson::DateTime(bson::DateTime::from_chrono(*value)),
            Value::List(items) => Bson::Array(
                items
                    .iter()
                    .map(Value::to_bson)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ),
            Value::Map(entries) => Bson::Document(
                entries
                    .iter()
                    .map(|(key, value)| value.to_bson().map(|bson| (key.clone(), bson)))
                    .collect::<DocumentStoreResult<Document>>()?,
            ),
            Value::GeoPoint(point) => Bson::Document(bson::doc! {
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
            Value::Reference(instance) => Bson::String(instance.document_path()?.to_string()),
        })
    }

    /// Converts stored BSON back into a native value without any field-specific coercion.
    pub fn from_bson(bson: Bson) -> DocumentStoreResult<Value> {
        Ok(match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(value) => Value::Bool(value),
            Bson::Int32(value) => Value::Int(value as i64),
            Bson::Int64(value) => Value::Int(value),
            Bson::Double(value) => Value::Float(value),
            Bson::String(value) => Value::String(value),
            Bson::DateTime(value) => Value::Timestamp(value.to_chrono()),
            Bson::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_bson)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ),
            Bson::Document(document) => Value::Map(
                document
                    .into_iter()
                    .map(|(key, value)| Value::from_bson(value).map(|value| (key, value)))
                    .collect::<DocumentStoreResult<BTreeMap<_, _>>>()?,
            ),
            other => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "unsupported stored value {other}"
                )));
            }
        })
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<GeoPoint> for Value {
    fn from(value: GeoPoint) -> Self {
        Value::GeoPoint(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Reference(Box::new(value))
    }
}

impl From<&Instance> for Value {
    fn from(value: &Instance) -> Self {
        Value::Reference(Box::new(value.clone()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(value: BTreeMap<String, T>) -> Self {
        Value::Map(
            value
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        )
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Builds a `Vec<(String, Value)>` of named values, the argument shape taken by
/// `filter`, `get`, `create`, `update` and `Model::new_instance`.
///
/// ```ignore
/// let clauses = fields! { "active" => true, "age__gt" => 18 };
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::value::Value)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((::std::string::String::from($key), $crate::value::Value::from($value))),+]
    };
}
