//! Common types used throughout the tap
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Ordered key-value map with string keys and values
pub type StringMap = BTreeMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method used by stream endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
        }
    }
}

// ============================================================================
// Replication
// ============================================================================

/// How a stream is replicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMode {
    /// Re-fetch everything on every run
    #[default]
    FullTable,
    /// Fetch only records newer than the bookmark
    Incremental,
}

/// Order in which an endpoint returns records, by replication key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// No ordering guarantee
    #[default]
    Unsorted,
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Replication Values
// ============================================================================

/// A comparable replication-key value
///
/// HubSpot mixes ISO timestamps and epoch milliseconds across endpoints, so
/// timestamps and integers compare through their millisecond value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationValue {
    /// A parsed timestamp
    Timestamp(DateTime<Utc>),
    /// Epoch milliseconds
    Millis(i64),
    /// An opaque string, compared lexically
    Text(String),
}

impl ReplicationValue {
    /// Interpret a JSON value as a replication value
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(
                parse_datetime(s)
                    .map(Self::Timestamp)
                    .unwrap_or_else(|| Self::Text(s.clone())),
            ),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::Millis),
            _ => None,
        }
    }

    /// Millisecond value, when this is a timestamp or integer
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Timestamp(dt) => Some(dt.timestamp_millis()),
            Self::Millis(ms) => Some(*ms),
            Self::Text(_) => None,
        }
    }

    /// Convert to a timestamp, when possible
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(dt) => Some(*dt),
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(_) => None,
        }
    }
}

impl PartialOrd for ReplicationValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Text(_), _) | (_, Self::Text(_)) => None,
            (a, b) => Some(a.to_millis()?.cmp(&b.to_millis()?)),
        }
    }
}

/// Parse the datetime formats HubSpot and users hand us
///
/// Accepts RFC3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (as UTC) and `YYYY-MM-DD`.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Convert a date string or epoch-millis value to epoch milliseconds
pub fn to_epoch_millis(value: &Value) -> Option<i64> {
    ReplicationValue::from_json(value)?.to_millis()
}

/// Format a timestamp the way records carry it
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
