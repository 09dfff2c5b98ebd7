//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::{Error, Result};
use crate::types::{Method, StringMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position of the next page to fetch
///
/// A token only carries what the last response returned, so iteration can
/// be resumed from any token without replaying earlier pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageToken {
    /// Item offset (legacy v1 endpoints)
    Offset(u64),
    /// Opaque `paging.next.after` cursor
    After(String),
    /// Search position: lower bound in epoch ms plus the cursor within it
    Search {
        /// Replication-key lower bound (inclusive)
        since: i64,
        /// Cursor within the current filter, if any
        after: Option<String>,
    },
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available at this position
    Continue(PageToken),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// An outgoing page request before the page position is applied
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base, or an absolute URL
    pub path: String,
    /// Query parameters
    pub query: StringMap,
    /// JSON body
    pub body: Option<Value>,
}

impl PageRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: StringMap::new(),
            body: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: StringMap::new(),
            body: Some(body),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add all query parameters
    #[must_use]
    pub fn with_params(mut self, params: StringMap) -> Self {
        self.query.extend(params);
        self
    }
}

/// Where records live in a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// Array under a top-level field (`results`, `subscriptionDefinitions`)
    Field(&'static str),
    /// The body itself is an array of records
    Root,
    /// The body is a single record
    Object,
}

impl RecordSelector {
    /// Extract the raw records from a response body
    ///
    /// A missing field or null body yields no records. A field that is
    /// present but not an array is a protocol violation.
    pub fn extract(&self, body: &Value) -> Result<Vec<Value>> {
        match self {
            Self::Field(field) => match body.get(*field) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => Ok(items.clone()),
                Some(other) => Err(Error::protocol(format!(
                    "Expected array under '{field}', found {}",
                    json_kind(other)
                ))),
            },
            Self::Root => match body {
                Value::Null => Ok(Vec::new()),
                Value::Array(items) => Ok(items.clone()),
                other => Err(Error::protocol(format!(
                    "Expected array body, found {}",
                    json_kind(other)
                ))),
            },
            Self::Object => match body {
                Value::Null => Ok(Vec::new()),
                Value::Object(_) => Ok(vec![body.clone()]),
                other => Err(Error::protocol(format!(
                    "Expected object body, found {}",
                    json_kind(other)
                ))),
            },
        }
    }
}

/// Short name of a JSON value's shape, for diagnostics
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Trait for pagination strategies
///
/// Strategies hold configuration only. Everything that changes from page to
/// page travels in the [`PageToken`].
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Position of the first page
    fn initial_token(&self) -> Option<PageToken> {
        None
    }

    /// Write the page position into the request
    fn apply_token(&self, request: &mut PageRequest, token: Option<&PageToken>);

    /// Decide the next position from the page just fetched
    fn process_response(
        &self,
        body: &Value,
        records: &[Value],
        token: Option<&PageToken>,
    ) -> Result<NextPage>;
}

/// Extract `paging.next.after` from a v3 response
pub fn next_after(body: &Value) -> Option<String> {
    match body.pointer("/paging/next/after")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
