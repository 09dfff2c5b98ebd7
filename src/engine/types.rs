//! Engine types
//!
//! Per-stream status and run statistics.

use serde::Serialize;

/// Lifecycle of one stream within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// Not started
    #[default]
    Pending,
    /// Fetching
    Running,
    /// Finished successfully
    Completed,
    /// Aborted by a fatal error
    Failed,
}

impl StreamStatus {
    /// Whether the stream reached a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records handed to the sink
    pub records_emitted: usize,
    /// Records dropped by the transform
    pub records_skipped: usize,
    /// Pages fetched
    pub pages_fetched: usize,
    /// Streams that completed
    pub streams_completed: usize,
    /// Stream contexts that completed
    pub contexts_completed: usize,
    /// Checkpoints written
    pub checkpoints: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another run's counters
    pub fn merge(&mut self, other: &SyncStats) {
        self.records_emitted += other.records_emitted;
        self.records_skipped += other.records_skipped;
        self.pages_fetched += other.pages_fetched;
        self.streams_completed += other.streams_completed;
        self.contexts_completed += other.contexts_completed;
        self.checkpoints += other.checkpoints;
    }
}
