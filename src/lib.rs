// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # HubSpot Tap
//!
//! A resumable, incremental extractor for the HubSpot CRM REST API.
//!
//! ## Features
//!
//! - **OAuth2 Refresh**: Single-flight token refresh, replay once on 401
//! - **Retries and Rate Limits**: Exponential backoff on 429/5xx, token bucket limiter
//! - **Pagination**: Legacy offset, v3 cursor, and CRM search with the 10k re-anchor
//! - **Incremental Sync**: Per-stream and per-context bookmarks, atomic checkpoints
//! - **Parent/Child Streams**: Forms feed submissions, campaigns feed reports and assets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hubspot_tap::{MemorySink, StateManager, SyncEngine, TapConfig};
//!
//! let config = Arc::new(TapConfig::from_json_str(r#"{"access_token": "pat-..."}"#)?);
//! let credentials = Arc::new(CredentialManager::from_config(&config, reqwest::Client::new())?);
//! let client = HttpClient::with_credentials(config.http_client_config(), credentials)?;
//!
//! let sink = Arc::new(MemorySink::new());
//! let engine = SyncEngine::new(config, client, StateManager::in_memory(), sink.clone())?;
//! let stats = engine.run().await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                             │
//! │   StreamGraph order → contexts → pages → conform → sink/state   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │ Partition │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Static   │ GET/POST  │ Offset        │ Parent    │ SCHEMA      │
//! │ OAuth2   │ Retry     │ Cursor        │ List      │ RECORD      │
//! │ Refresh  │ Rate Limit│ Search        │ Windows   │ STATE       │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// Credential management and token refresh
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Partition routing and stream contexts
pub mod partition;

/// Stream schemas, conformance and flattening
pub mod schema;

/// State management and checkpointing
pub mod state;

/// Stream definitions and the HubSpot catalog
pub mod streams;

/// Sync orchestration
pub mod engine;

/// Output messages and sinks
pub mod sink;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::CredentialManager;
pub use config::TapConfig;
pub use engine::{StreamStatus, SyncEngine, SyncStats};
pub use http::HttpClient;
pub use sink::{JsonLinesSink, MemorySink, Message, RecordSink};
pub use state::StateManager;
pub use streams::{Catalog, StreamDefinition};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
