//! Record and schema flattening
//!
//! Nested object keys are joined with `__` down to a maximum depth. Objects
//! below that depth and every array are stored as JSON strings.

use super::types::{FieldType, ObjectSchema};
use crate::types::JsonObject;
use serde_json::Value;

/// Separator between parent and child keys
pub const FLATTEN_SEPARATOR: &str = "__";

/// Flatten a record to at most `max_depth` levels of nesting
pub fn flatten_record(record: JsonObject, max_depth: usize) -> JsonObject {
    let mut out = JsonObject::new();
    flatten_into(&mut out, record, None, 0, max_depth);
    out
}

fn flatten_into(
    out: &mut JsonObject,
    object: JsonObject,
    prefix: Option<&str>,
    level: usize,
    max_depth: usize,
) {
    for (key, value) in object {
        let name = join_key(prefix, &key);
        match value {
            Value::Object(inner) if level < max_depth => {
                flatten_into(out, inner, Some(&name), level + 1, max_depth);
            }
            Value::Object(_) | Value::Array(_) => {
                out.insert(name, Value::String(value.to_string()));
            }
            scalar => {
                out.insert(name, scalar);
            }
        }
    }
}

/// Flatten a schema the same way records are flattened
///
/// Flattening an open object means the flattened schema has to accept
/// keys it does not declare.
pub fn flatten_schema(schema: &ObjectSchema, max_depth: usize) -> ObjectSchema {
    let mut out = ObjectSchema {
        additional_properties: schema.additional_properties,
        ..ObjectSchema::default()
    };
    flatten_schema_into(&mut out, schema, None, 0, max_depth);
    out
}

fn flatten_schema_into(
    out: &mut ObjectSchema,
    schema: &ObjectSchema,
    prefix: Option<&str>,
    level: usize,
    max_depth: usize,
) {
    for (key, ty) in &schema.properties {
        let name = join_key(prefix, key);
        match ty {
            FieldType::Object(inner) if level < max_depth => {
                if inner.additional_properties {
                    out.additional_properties = true;
                }
                flatten_schema_into(out, inner, Some(&name), level + 1, max_depth);
            }
            FieldType::Object(_) | FieldType::Array(_) => {
                out.insert(name, FieldType::String);
            }
            scalar => {
                out.insert(name, scalar.clone());
            }
        }
    }
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{FLATTEN_SEPARATOR}{key}"),
        None => key.to_string(),
    }
}
