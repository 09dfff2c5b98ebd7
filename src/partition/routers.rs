//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{Context, PartitionRouter};
use crate::error::Result;
use chrono::{DateTime, Duration, Months, Utc};

// ============================================================================
// List Router
// ============================================================================

/// List-based partition router
///
/// Creates partitions from a static list of values.
#[derive(Debug, Clone)]
pub struct ListRouter {
    /// List of partition values
    values: Vec<String>,
    /// Field name for partition
    partition_field: String,
}

impl ListRouter {
    /// Create a new list router
    pub fn new<S: Into<String>>(
        values: impl IntoIterator<Item = S>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            partition_field: partition_field.into(),
        }
    }
}

impl PartitionRouter for ListRouter {
    fn partitions(&self) -> Result<Vec<Context>> {
        Ok(self
            .values
            .iter()
            .map(|v| Context::new().with(self.partition_field.clone(), v.clone()))
            .collect())
    }

    fn partition_field(&self) -> &str {
        &self.partition_field
    }
}

// ============================================================================
// Date Windows
// ============================================================================

/// A half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Start as epoch milliseconds
    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    /// End as epoch milliseconds
    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// Split `[start, end)` into consecutive windows of at most `step`
///
/// Returns an empty list when `start >= end` or `step` is not positive.
pub fn date_windows(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Vec<DateWindow> {
    let mut windows = Vec::new();
    if step <= Duration::zero() {
        return windows;
    }

    let mut current = start;
    while current < end {
        let next = std::cmp::min(current + step, end);
        windows.push(DateWindow {
            start: current,
            end: next,
        });
        current = next;
    }
    windows
}

/// The window of `years` calendar years ending at `end`
pub fn trailing_years(end: DateTime<Utc>, years: u32) -> DateWindow {
    let start = end
        .checked_sub_months(Months::new(years * 12))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    DateWindow { start, end }
}
