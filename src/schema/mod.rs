//! Stream schemas
//!
//! Provides the typed schema tree each stream declares, and the record
//! processing driven by it.
//!
//! # Features
//!
//! - **Type Tags**: Plain data tree of field types, rendered to JSON Schema
//! - **Conformance**: Coerces loose API values and rejects malformed records
//! - **Flattening**: Joins nested keys with `__` down to a maximum depth

mod conform;
mod flatten;
mod types;

pub use conform::conform_record;
pub use flatten::{flatten_record, flatten_schema, FLATTEN_SEPARATOR};
pub use types::{FieldType, ObjectSchema};
