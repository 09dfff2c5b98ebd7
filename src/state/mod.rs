//! State management module
//!
//! Handles bookmark tracking, checkpointing, and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Bookmarks per stream, and per context for child streams
//! - `StateManager` - Shared store with atomic file persistence
//! - Checkpointing for resumable syncs

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{is_newer, PartitionState, State, StreamState};
