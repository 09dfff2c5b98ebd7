//! Pagination strategy implementations
//!
//! Each strategy handles one of the API's pagination patterns.

use super::types::{next_after, NextPage, PageRequest, PageToken, Paginator};
use crate::error::{Error, Result};
use crate::types::ReplicationValue;
use serde_json::{json, Value};

/// The search API refuses to page beyond this many results per filter
pub const SEARCH_RESULT_CAP: u64 = 10_000;

// ============================================================================
// No Pagination
// ============================================================================

/// Single request, single page
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn apply_token(&self, _request: &mut PageRequest, _token: Option<&PageToken>) {}

    fn process_response(
        &self,
        _body: &Value,
        _records: &[Value],
        _token: Option<&PageToken>,
    ) -> Result<NextPage> {
        Ok(NextPage::Done)
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination for the legacy v1 endpoints
///
/// Starts at offset 0 and advances by the page size until a page comes back
/// short.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub limit_value: u32,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(
        offset_param: impl Into<String>,
        limit_param: impl Into<String>,
        limit_value: u32,
    ) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
            limit_value: limit_value.max(1),
        }
    }
}

impl Paginator for OffsetPaginator {
    fn initial_token(&self) -> Option<PageToken> {
        Some(PageToken::Offset(0))
    }

    fn apply_token(&self, request: &mut PageRequest, token: Option<&PageToken>) {
        let offset = match token {
            Some(PageToken::Offset(offset)) => *offset,
            _ => 0,
        };
        request
            .query
            .insert(self.offset_param.clone(), offset.to_string());
        request
            .query
            .insert(self.limit_param.clone(), self.limit_value.to_string());
    }

    fn process_response(
        &self,
        _body: &Value,
        records: &[Value],
        token: Option<&PageToken>,
    ) -> Result<NextPage> {
        if records.len() < self.limit_value as usize {
            return Ok(NextPage::Done);
        }

        let offset = match token {
            Some(PageToken::Offset(offset)) => *offset,
            _ => 0,
        };
        Ok(NextPage::Continue(PageToken::Offset(
            offset + u64::from(self.limit_value),
        )))
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination for v3 endpoints
///
/// Follows `paging.next.after` until a response no longer carries one.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for cursor
    pub cursor_param: String,
    /// Query parameter name for page size
    pub limit_param: String,
    /// Page size
    pub limit_value: u32,
}

impl CursorPaginator {
    /// Create a new cursor paginator using `after` and `limit`
    pub fn new(limit_value: u32) -> Self {
        Self {
            cursor_param: "after".to_string(),
            limit_param: "limit".to_string(),
            limit_value,
        }
    }
}

impl Paginator for CursorPaginator {
    fn apply_token(&self, request: &mut PageRequest, token: Option<&PageToken>) {
        request
            .query
            .insert(self.limit_param.clone(), self.limit_value.to_string());
        match token {
            Some(PageToken::After(cursor)) => {
                request
                    .query
                    .insert(self.cursor_param.clone(), cursor.clone());
            }
            _ => {
                request.query.remove(&self.cursor_param);
            }
        }
    }

    fn process_response(
        &self,
        body: &Value,
        _records: &[Value],
        _token: Option<&PageToken>,
    ) -> Result<NextPage> {
        Ok(match next_after(body) {
            Some(cursor) => NextPage::Continue(PageToken::After(cursor)),
            None => NextPage::Done,
        })
    }
}

// ============================================================================
// Search Pagination
// ============================================================================

/// CRM search pagination
///
/// Filters on `replication_key >= since` (plus `< window_end` when set),
/// sorted ascending, with the cursor carried in the body. When the next
/// cursor would cross [`SEARCH_RESULT_CAP`], the filter is re-anchored at the
/// last replication value seen and the cursor dropped.
///
/// The re-anchored filter is inclusive, so records sharing the anchor value
/// are returned again on the next page. Downstream consumers see them twice
/// and should dedupe on the primary key.
#[derive(Debug, Clone)]
pub struct SearchPaginator {
    /// Property to filter and sort on
    pub replication_key: String,
    /// Initial lower bound in epoch ms
    pub since: i64,
    /// Exclusive upper bound in epoch ms
    pub window_end: Option<i64>,
    /// Property names to request
    pub properties: Vec<String>,
    /// Page size (the API allows at most 100)
    pub limit: u32,
}

impl SearchPaginator {
    /// Create a search paginator starting at `since`
    pub fn new(replication_key: impl Into<String>, since: i64) -> Self {
        Self {
            replication_key: replication_key.into(),
            since,
            window_end: None,
            properties: Vec::new(),
            limit: 100,
        }
    }

    /// Restrict the search to values before `end`
    #[must_use]
    pub fn with_window_end(mut self, end: i64) -> Self {
        self.window_end = Some(end);
        self
    }

    /// Set the property names to request
    #[must_use]
    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    /// Build the search body for a position
    pub fn body(&self, since: i64, after: Option<&str>) -> Value {
        let mut filters = vec![json!({
            "propertyName": self.replication_key,
            "operator": "GTE",
            "value": since.to_string(),
        })];
        if let Some(end) = self.window_end {
            filters.push(json!({
                "propertyName": self.replication_key,
                "operator": "LT",
                "value": end.to_string(),
            }));
        }

        let mut body = json!({
            "filterGroups": [{"filters": filters}],
            "sorts": [{"propertyName": self.replication_key, "direction": "ASCENDING"}],
            "limit": self.limit,
            "properties": self.properties,
        });
        if let Some(after) = after {
            body["after"] = Value::String(after.to_string());
        }
        body
    }

    /// Replication value of a raw search result, in epoch ms
    fn record_millis(&self, record: &Value) -> Option<i64> {
        let raw = record
            .get("properties")
            .and_then(|p| p.get(&self.replication_key))
            .or_else(|| record.get(&self.replication_key))?;
        ReplicationValue::from_json(raw)?.to_millis()
    }
}

impl Paginator for SearchPaginator {
    fn initial_token(&self) -> Option<PageToken> {
        Some(PageToken::Search {
            since: self.since,
            after: None,
        })
    }

    fn apply_token(&self, request: &mut PageRequest, token: Option<&PageToken>) {
        let (since, after) = match token {
            Some(PageToken::Search { since, after }) => (*since, after.as_deref()),
            _ => (self.since, None),
        };
        request.body = Some(self.body(since, after));
    }

    fn process_response(
        &self,
        body: &Value,
        records: &[Value],
        token: Option<&PageToken>,
    ) -> Result<NextPage> {
        let Some(after) = next_after(body) else {
            return Ok(NextPage::Done);
        };
        let since = match token {
            Some(PageToken::Search { since, .. }) => *since,
            _ => self.since,
        };

        let offset: u64 = after.parse().unwrap_or(0);
        if offset + u64::from(self.limit) < SEARCH_RESULT_CAP {
            return Ok(NextPage::Continue(PageToken::Search {
                since,
                after: Some(after),
            }));
        }

        let anchor = records
            .iter()
            .rev()
            .find_map(|r| self.record_millis(r))
            .ok_or_else(|| {
                Error::protocol("Search page at the result cap has no replication values")
            })?;
        if anchor <= since {
            return Err(Error::protocol(format!(
                "Search cannot advance: more than {SEARCH_RESULT_CAP} results share {} = {anchor}",
                self.replication_key
            )));
        }

        Ok(NextPage::Continue(PageToken::Search {
            since: anchor,
            after: None,
        }))
    }
}
