//! Record conformance
//!
//! Walks a raw record against its schema, coercing values the API sends in
//! a looser form and rejecting records whose shape contradicts the schema.

use super::types::{FieldType, ObjectSchema};
use crate::error::{Error, Result};
use crate::pagination::json_kind;
use crate::types::{format_datetime, parse_datetime, JsonObject};
use chrono::DateTime;
use serde_json::{Number, Value};

/// Conform one record to a stream schema
///
/// Fails with a record error when the record is not an object, a primary
/// key field is missing or null, or a value cannot be coerced.
pub fn conform_record(
    stream: &str,
    record: Value,
    schema: &ObjectSchema,
    primary_key: &[&str],
) -> Result<JsonObject> {
    let object = match record {
        Value::Object(object) => object,
        other => {
            return Err(Error::record(
                stream,
                format!("expected an object, found {}", json_kind(&other)),
            ));
        }
    };

    for key in primary_key {
        if object.get(*key).map_or(true, Value::is_null) {
            return Err(Error::record(
                stream,
                format!("primary key field '{key}' is missing"),
            ));
        }
    }

    conform_object(object, schema, "").map_err(|message| Error::record(stream, message))
}

fn conform_object(
    object: JsonObject,
    schema: &ObjectSchema,
    path: &str,
) -> std::result::Result<JsonObject, String> {
    let mut out = JsonObject::new();

    for (key, value) in object {
        let field_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };

        match schema.get(&key) {
            Some(ty) => {
                out.insert(key, conform_value(value, ty, &field_path)?);
            }
            None if schema.additional_properties => {
                out.insert(key, value);
            }
            None => {}
        }
    }

    Ok(out)
}

fn conform_value(value: Value, ty: &FieldType, path: &str) -> std::result::Result<Value, String> {
    if value.is_null() {
        return Ok(value);
    }

    let mismatch = |value: &Value| {
        format!(
            "field '{path}' expected {}, found {}",
            ty.type_name(),
            json_kind(value)
        )
    };

    match ty {
        FieldType::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch(&other)),
        },

        FieldType::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::Number(Number::from(f as i64)))
                }
                _ => Err(format!("field '{path}' is not a whole number: {n}")),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| Value::Number(Number::from(i)))
                .map_err(|_| format!("field '{path}' is not an integer: {s:?}")),
            other => Err(mismatch(other)),
        },

        FieldType::Number => match &value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("field '{path}' is not a number: {s:?}")),
            other => Err(mismatch(other)),
        },

        FieldType::Boolean => match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Value::String(s) => Err(format!("field '{path}' is not a boolean: {s:?}")),
            other => Err(mismatch(other)),
        },

        FieldType::DateTime => match &value {
            Value::String(s) if s.is_empty() => Ok(Value::Null),
            Value::String(s) => match parse_datetime(s) {
                Some(_) => Ok(Value::String(s.clone())),
                None => Err(format!("field '{path}' is not a timestamp: {s:?}")),
            },
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Value::String(format_datetime(&dt)))
                .ok_or_else(|| format!("field '{path}' is not epoch milliseconds: {n}")),
            other => Err(mismatch(other)),
        },

        FieldType::Date => match &value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Value::String(dt.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| format!("field '{path}' is not epoch milliseconds: {n}")),
            other => Err(mismatch(other)),
        },

        FieldType::Object(schema) => match value {
            Value::Object(object) => conform_object(object, schema, path).map(Value::Object),
            other => Err(mismatch(&other)),
        },

        FieldType::Array(items) => match value {
            Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| conform_value(v, items, &format!("{path}[{i}]")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(mismatch(&other)),
        },
    }
}
