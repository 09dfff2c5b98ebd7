//! HTTP client module
//!
//! Provides the authenticated HTTP client used by every stream.
//!
//! # Features
//!
//! - **Bearer Auth**: Token from the credential manager on every call
//! - **401 Recovery**: One forced refresh and replay, then `AuthError`
//! - **Automatic Retries**: Exponential backoff on 429/5xx, honoring `Retry-After`
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Typed Failures**: `ClientError`, `TransientAPIError`, `ProtocolError`

mod client;
mod rate_limit;

pub use client::{ApiResponse, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
