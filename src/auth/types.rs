//! Credential types

use crate::config::TapConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Where bearer tokens come from
#[derive(Clone)]
pub enum Credential {
    /// A long-lived access token, used as-is
    Static {
        /// The access token
        access_token: String,
    },

    /// OAuth2 refresh-token flow
    Refreshable {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Refresh token
        refresh_token: String,
        /// Access token supplied alongside the refresh token, if any
        access_token: Option<String>,
    },
}

impl Credential {
    /// Pick the credential source from the tap configuration
    ///
    /// A refresh token with client id and secret wins over a bare access
    /// token, matching how the API issues OAuth app credentials.
    pub fn from_config(config: &TapConfig) -> Result<Self> {
        if config.has_refresh_credentials() {
            return Ok(Self::Refreshable {
                token_url: config.token_url.clone(),
                client_id: config.client_id.clone().unwrap_or_default(),
                client_secret: config.client_secret.clone().unwrap_or_default(),
                refresh_token: config.refresh_token.clone().unwrap_or_default(),
                access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            });
        }

        match config.access_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Ok(Self::Static {
                access_token: token.to_string(),
            }),
            None => Err(Error::auth("No usable credential configured")),
        }
    }

    /// Whether this credential can never be refreshed
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static { .. })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { .. } => f.debug_struct("Static").finish_non_exhaustive(),
            Self::Refreshable {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("Refreshable")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires; unknown expiry forces a refresh
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired, or will be within `margin`
    pub fn is_expired(&self, margin: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + margin >= expires_at,
            None => true,
        }
    }
}
