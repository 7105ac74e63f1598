//! Conversion of stored records into their JSON transport form.

use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

use crate::store::StoreError;

/// Convert one stored record for a response: the `_id` ObjectId becomes its hex string and
/// `createdAt` becomes an ISO-8601 timestamp.
///
/// Must be applied exactly once per record. A record whose `_id` is already a string is
/// rejected rather than passed through.
pub fn to_transport(record: Document) -> Result<Value, StoreError> {
    match record.get("_id") {
        Some(Bson::ObjectId(_)) => {}
        Some(other) => {
            return Err(StoreError::Serialization(format!(
                "record identifier must be an ObjectId, found {}",
                type_name(other)
            )))
        }
        None => {
            return Err(StoreError::Serialization(
                "record has no identifier".to_string(),
            ))
        }
    }
    if let Some(created_at) = record.get("createdAt") {
        if !matches!(created_at, Bson::DateTime(_)) {
            return Err(StoreError::Serialization(format!(
                "createdAt must be a datetime, found {}",
                type_name(created_at)
            )));
        }
    }
    Ok(document_to_json(record))
}

/// Convert an aggregation row or any other document without identifier checks.
pub fn document_to_json(document: Document) -> Value {
    let map: Map<String, Value> = document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect();
    Value::Object(map)
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        Bson::Int32(v) => Value::from(v),
        Bson::Int64(v) => Value::from(v),
        Bson::Double(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(inner) => document_to_json(inner),
        other => other.into_relaxed_extjson(),
    }
}

fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::String(_) => "string",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
        Bson::Null => "null",
        Bson::Document(_) => "object",
        _ => "another type",
    }
}
