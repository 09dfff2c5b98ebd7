//! Tap configuration
//!
//! The recognized input options plus the tuning knobs for retries, rate
//! limits and checkpointing. The configuration is immutable once validated
//! and is shared (behind an `Arc`) with the orchestrator and the credential
//! manager.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::{parse_datetime, BackoffType, JsonValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default API host
pub const DEFAULT_API_BASE_URL: &str = "https://api.hubapi.com";

/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";

/// Configuration for a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Long-lived or initial access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// OAuth app client ID
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth app client secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// OAuth refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Earliest record date to sync
    #[serde(default)]
    pub start_date: Option<String>,

    /// Latest record date to sync
    #[serde(default)]
    pub end_date: Option<String>,

    /// Flatten nested objects into `parent__child` keys
    #[serde(default)]
    pub flattening_enabled: bool,

    /// Maximum flattening depth
    #[serde(default)]
    pub flattening_max_depth: Option<usize>,

    /// API host, overridable for testing
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth2 token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// User agent sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Retry budget for 429/5xx/transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Steady-state request rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Rate limiter burst size
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Records between mid-stream checkpoints (0 disables them)
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Independent streams fetched concurrently
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,

    /// Split incremental search requests into windows of this many days
    #[serde(default)]
    pub search_window_days: Option<u32>,

    /// Refresh this many seconds before the token expires
    #[serde(default = "default_token_expiry_margin_secs")]
    pub token_expiry_margin_secs: u64,

    /// Streams to sync (empty = all)
    #[serde(default)]
    pub streams: Vec<String>,

    /// Pass-through options for the output layer (stream maps, batching)
    #[serde(flatten)]
    pub extras: BTreeMap<String, JsonValue>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_burst_size() -> u32 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_checkpoint_interval() -> usize {
    1000
}

fn default_max_concurrent_streams() -> usize {
    1
}

fn default_token_expiry_margin_secs() -> u64 {
    60
}

/// Default flattening depth when flattening is on but no depth is given
const DEFAULT_FLATTENING_MAX_DEPTH: usize = 1;

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            start_date: None,
            end_date: None,
            flattening_enabled: false,
            flattening_max_depth: None,
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            user_agent: None,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            page_size: default_page_size(),
            checkpoint_interval: default_checkpoint_interval(),
            max_concurrent_streams: default_max_concurrent_streams(),
            search_window_days: None,
            token_expiry_margin_secs: default_token_expiry_margin_secs(),
            streams: Vec::new(),
            extras: BTreeMap::new(),
        }
    }
}

impl TapConfig {
    /// Parse and validate a JSON config document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build and validate from an already-parsed JSON value
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.has_refresh_credentials() && non_empty(&self.access_token).is_none() {
            return Err(Error::config(
                "Either access_token or refresh_token, client_id and client_secret must be provided",
            ));
        }

        url::Url::parse(&self.api_base_url)?;
        url::Url::parse(&self.token_url)?;

        let start = self.start_datetime()?;
        let end = self.end_datetime()?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(Error::invalid_value(
                    "end_date",
                    "end_date must not be earlier than start_date",
                ));
            }
        }

        if self.flattening_enabled && self.flattening_max_depth == Some(0) {
            return Err(Error::invalid_value(
                "flattening_max_depth",
                "must be at least 1 when flattening is enabled",
            ));
        }

        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be positive"));
        }

        Ok(())
    }

    /// Whether the OAuth refresh flow is configured
    ///
    /// The literal string `"None"` is treated as absent, matching how some
    /// orchestrators render unset secrets.
    pub fn has_refresh_credentials(&self) -> bool {
        non_empty(&self.refresh_token).is_some_and(|t| t != "None")
            && non_empty(&self.client_id).is_some()
            && non_empty(&self.client_secret).is_some()
    }

    /// Parsed `start_date`
    pub fn start_datetime(&self) -> Result<Option<DateTime<Utc>>> {
        parse_config_date("start_date", self.start_date.as_deref())
    }

    /// Parsed `end_date`
    pub fn end_datetime(&self) -> Result<Option<DateTime<Utc>>> {
        parse_config_date("end_date", self.end_date.as_deref())
    }

    /// Effective flattening depth, or `None` when flattening is off
    pub fn flattening_depth(&self) -> Option<usize> {
        self.flattening_enabled
            .then(|| self.flattening_max_depth.unwrap_or(DEFAULT_FLATTENING_MAX_DEPTH))
    }

    /// Whether a stream was selected for this run
    pub fn is_selected(&self, stream: &str) -> bool {
        self.streams.is_empty() || self.streams.iter().any(|s| s == stream)
    }

    /// HTTP client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.api_base_url)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                BackoffType::Exponential,
                Duration::from_millis(self.backoff_base_ms),
                Duration::from_millis(self.max_backoff_ms),
            )
            .backoff_factor(self.backoff_factor)
            .rate_limit(RateLimiterConfig::new(
                self.requests_per_second,
                self.burst_size,
            ));
        if let Some(agent) = non_empty(&self.user_agent) {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn parse_config_date(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.filter(|s| !s.trim().is_empty()) {
        None => Ok(None),
        Some(s) => parse_datetime(s)
            .map(Some)
            .ok_or_else(|| Error::invalid_value(field, format!("unrecognized date '{s}'"))),
    }
}
