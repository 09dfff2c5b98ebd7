//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use crate::partition::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared bookmark store with serialized checkpoints
///
/// Clones share the same state. Concurrent streams each touch only their own
/// entries; checkpoint writes are serialized by an internal lock.
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file, if persisted
    path: Option<PathBuf>,
    /// Current state
    state: Arc<RwLock<State>>,
    /// Held for the duration of a checkpoint write
    checkpoint_lock: Arc<Mutex<()>>,
    /// Number of checkpoints taken
    checkpoints: Arc<AtomicU64>,
}

impl StateManager {
    fn with_state(path: Option<PathBuf>, state: State) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
            checkpoint_lock: Arc::new(Mutex::new(())),
            checkpoints: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create an empty state manager persisting to `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_state(Some(path.as_ref().to_path_buf()), State::new())
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(None, State::new())
    }

    /// Create an in-memory state manager from an existing state
    pub fn from_state(state: State) -> Self {
        Self::with_state(None, state)
    }

    /// Create a state manager from a file, loading existing state if present
    ///
    /// An empty file counts as no state.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };

        Ok(Self::with_state(Some(path), state))
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(None, parse_state(json)?))
    }

    /// Bookmark for a stream or one of its contexts
    pub async fn bookmark(&self, stream: &str, context: Option<&Context>) -> Option<Value> {
        let state = self.state.read().await;
        state.bookmark(stream, context).cloned()
    }

    /// Move a bookmark forward; returns whether it changed
    pub async fn advance_bookmark(
        &self,
        stream: &str,
        context: Option<&Context>,
        replication_key: &str,
        value: &Value,
    ) -> bool {
        let mut state = self.state.write().await;
        state.advance_bookmark(stream, context, replication_key, value)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Current state as a JSON value
    pub async fn to_value(&self) -> Result<Value> {
        let state = self.state.read().await;
        Ok(serde_json::to_value(&*state)?)
    }

    /// Take a checkpoint
    ///
    /// Snapshots the state, writes it to the state file when one is
    /// configured, and returns the snapshot for emission.
    pub async fn checkpoint(&self) -> Result<State> {
        let _guard = self.checkpoint_lock.lock().await;
        let snapshot = self.snapshot().await;

        if let Some(path) = &self.path {
            write_atomic(path, &snapshot)
                .await
                .map_err(|e| Error::Checkpoint {
                    message: e.to_string(),
                })?;
        }

        let count = self.checkpoints.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(checkpoint = count, "State checkpoint written");
        Ok(snapshot)
    }

    /// Number of checkpoints taken so far
    pub fn checkpoint_count(&self) -> u64 {
        self.checkpoints.load(Ordering::SeqCst)
    }

    /// Get the state file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

fn parse_state(json: &str) -> Result<State> {
    if json.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(json).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}

/// Write to a temp file first, then rename over the target
async fn write_atomic(path: &Path, state: &State) -> Result<()> {
    let contents = serde_json::to_string_pretty(state)
        .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &contents)
        .await
        .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

    Ok(())
}
