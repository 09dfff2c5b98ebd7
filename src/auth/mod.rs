//! Authentication module
//!
//! Holds the HubSpot credential and keeps a valid bearer token available
//! for every outbound request. Two sources are supported:
//!
//! - a static, long-lived access token (private app token), never refreshed
//! - the OAuth2 refresh-token flow, refreshed ahead of expiry
//!
//! Refreshes are serialized: concurrent callers wait on the single in-flight
//! refresh and reuse its result.

mod credentials;
mod types;

pub use credentials::CredentialManager;
pub use types::{CachedToken, Credential};
