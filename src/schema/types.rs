//! Schema types
//!
//! A stream schema is plain data: a tree of field names to type tags. The
//! JSON Schema document sent to the catalog is derived from it.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Type tag of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Text
    String,
    /// Whole number
    Integer,
    /// Any number
    Number,
    /// true/false
    Boolean,
    /// RFC3339 timestamp (`format: date-time`)
    DateTime,
    /// Calendar date (`format: date`)
    Date,
    /// Nested object
    Object(ObjectSchema),
    /// Array of one item type
    Array(Box<FieldType>),
}

impl FieldType {
    /// A closed object with the given fields
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, FieldType)>) -> Self {
        Self::Object(ObjectSchema::new(fields))
    }

    /// An object whose keys are not known in advance
    pub fn open_object() -> Self {
        Self::Object(ObjectSchema::open())
    }

    /// An array of `items`
    pub fn array(items: FieldType) -> Self {
        Self::Array(Box::new(items))
    }

    /// Name of the JSON type this field holds
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String | Self::DateTime | Self::Date => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    /// Nullable JSON Schema for this field
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!([self.type_name(), "null"]));

        match self {
            Self::DateTime => {
                schema.insert("format".to_string(), json!("date-time"));
            }
            Self::Date => {
                schema.insert("format".to_string(), json!("date"));
            }
            Self::Object(object) => {
                schema.insert(
                    "properties".to_string(),
                    Value::Object(object.properties_json()),
                );
                schema.insert(
                    "additionalProperties".to_string(),
                    json!(object.additional_properties),
                );
            }
            Self::Array(items) => {
                schema.insert("items".to_string(), items.to_json_schema());
            }
            _ => {}
        }

        Value::Object(schema)
    }
}

/// Fields of an object, top-level stream schemas included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Declared fields
    pub properties: BTreeMap<String, FieldType>,
    /// Whether undeclared fields are kept
    pub additional_properties: bool,
}

impl ObjectSchema {
    /// A closed object with the given fields
    pub fn new<'a>(fields: impl IntoIterator<Item = (&'a str, FieldType)>) -> Self {
        Self {
            properties: fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
            additional_properties: false,
        }
    }

    /// An object that keeps every field
    pub fn open() -> Self {
        Self {
            properties: BTreeMap::new(),
            additional_properties: true,
        }
    }

    /// Allow undeclared fields
    #[must_use]
    pub fn allow_additional(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    /// Add or replace a field
    pub fn insert(&mut self, name: impl Into<String>, ty: FieldType) {
        self.properties.insert(name.into(), ty);
    }

    /// Add a field
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.insert(name, ty);
        self
    }

    /// Get a field type
    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.properties.get(name)
    }

    /// Whether a field is declared
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Top-level JSON Schema document
    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties_json(),
            "additionalProperties": self.additional_properties,
        })
    }

    fn properties_json(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(name, ty)| (name.clone(), ty.to_json_schema()))
            .collect()
    }
}
