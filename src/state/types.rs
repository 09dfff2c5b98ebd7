//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs:
//!
//! ```json
//! {"bookmarks": {
//!   "contacts": {"replication_key": "lastmodifieddate",
//!                "replication_key_value": "2024-03-01T00:00:00Z"},
//!   "form_submissions": {"partitions": [
//!     {"context": {"form_id": "f1"}, "replication_key": "submittedAt",
//!      "replication_key_value": 1709251200000}]}}}
//! ```

use crate::partition::Context;
use crate::types::ReplicationValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Complete state for a sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Bookmark for a stream, or for one of its contexts
    pub fn bookmark(&self, stream: &str, context: Option<&Context>) -> Option<&Value> {
        let stream_state = self.get_stream(stream)?;
        match context.filter(|c| !c.is_empty()) {
            None => stream_state.replication_key_value.as_ref(),
            Some(context) => stream_state
                .get_partition(context)?
                .replication_key_value
                .as_ref(),
        }
    }

    /// Move a bookmark forward
    ///
    /// The bookmark only changes when `value` is strictly newer than the
    /// stored one, so it never decreases. Returns whether it changed.
    pub fn advance_bookmark(
        &mut self,
        stream: &str,
        context: Option<&Context>,
        replication_key: &str,
        value: &Value,
    ) -> bool {
        let stream_state = self.get_stream_mut(stream);
        let (key_slot, value_slot) = match context.filter(|c| !c.is_empty()) {
            None => (
                &mut stream_state.replication_key,
                &mut stream_state.replication_key_value,
            ),
            Some(context) => {
                let partition = stream_state.get_partition_mut(context);
                (
                    &mut partition.replication_key,
                    &mut partition.replication_key_value,
                )
            }
        };

        if let Some(current) = value_slot.as_ref() {
            if !is_newer(value, current) {
                return false;
            }
        }

        *key_slot = Some(replication_key.to_string());
        *value_slot = Some(value.clone());
        true
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Replication key the bookmark refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication value durably emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,

    /// Per-context bookmarks (for child and partitioned streams)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionState>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get partition state
    pub fn get_partition(&self, context: &Context) -> Option<&PartitionState> {
        self.partitions.iter().find(|p| &p.context == context)
    }

    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, context: &Context) -> &mut PartitionState {
        let index = match self.partitions.iter().position(|p| &p.context == context) {
            Some(index) => index,
            None => {
                self.partitions.push(PartitionState::new(context.clone()));
                self.partitions.len() - 1
            }
        };
        &mut self.partitions[index]
    }
}

/// State for a single context of a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Context the bookmark belongs to
    pub context: Context,

    /// Replication key the bookmark refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication value durably emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,
}

impl PartitionState {
    /// Create an empty partition state for a context
    pub fn new(context: Context) -> Self {
        Self {
            context,
            replication_key: None,
            replication_key_value: None,
        }
    }
}

/// Whether `candidate` is strictly newer than `current`
///
/// Values that cannot be compared never replace a comparable bookmark.
/// An unreadable stored bookmark is replaced by any readable value.
pub fn is_newer(candidate: &Value, current: &Value) -> bool {
    match (
        ReplicationValue::from_json(candidate),
        ReplicationValue::from_json(current),
    ) {
        (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Greater),
        (Some(_), None) => true,
        (None, _) => false,
    }
}
