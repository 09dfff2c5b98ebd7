//! Credential manager implementation
//!
//! Hands out bearer tokens and performs the OAuth2 refresh when needed.

use super::types::{CachedToken, Credential};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 1800;

/// Mutable token state, guarded by one lock so refreshes are serialized
#[derive(Debug)]
struct TokenState {
    cached: Option<CachedToken>,
    refresh_token: Option<String>,
}

/// Keeps a valid bearer token available for every request
pub struct CredentialManager {
    /// Credential source
    credential: Credential,
    /// Cached token and current refresh token
    state: Arc<RwLock<TokenState>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Refresh this long before the token expires
    expiry_margin: chrono::Duration,
    /// Number of refreshes performed
    refreshes: AtomicU32,
}

impl CredentialManager {
    /// Create a new credential manager
    pub fn new(credential: Credential) -> Self {
        Self::with_client(credential, Client::new())
    }

    /// Create a credential manager with a custom HTTP client
    pub fn with_client(credential: Credential, http_client: Client) -> Self {
        let (cached, refresh_token) = match &credential {
            Credential::Static { access_token } => {
                (Some(CachedToken::new(access_token.clone(), None)), None)
            }
            // An access token handed in next to a refresh token has no known
            // expiry, so it is only used after the first refresh.
            Credential::Refreshable { refresh_token, .. } => (None, Some(refresh_token.clone())),
        };

        Self {
            credential,
            state: Arc::new(RwLock::new(TokenState {
                cached,
                refresh_token,
            })),
            http_client,
            expiry_margin: chrono::Duration::seconds(60),
            refreshes: AtomicU32::new(0),
        }
    }

    /// Build from the tap configuration
    pub fn from_config(config: &TapConfig, http_client: Client) -> Result<Self> {
        let credential = Credential::from_config(config)?;
        Ok(Self::with_client(credential, http_client)
            .with_expiry_margin(chrono::Duration::seconds(config.token_expiry_margin_secs as i64)))
    }

    /// Set the safety margin before expiry
    #[must_use]
    pub fn with_expiry_margin(mut self, margin: chrono::Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    /// Get a valid token, refreshing if necessary
    pub async fn get_valid_token(&self) -> Result<String> {
        if let Credential::Static { access_token } = &self.credential {
            return Ok(access_token.clone());
        }

        {
            let state = self.state.read().await;
            if let Some(token) = state.cached.as_ref() {
                if !token.is_expired(self.expiry_margin) {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut state = self.state.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = state.cached.as_ref() {
            if !token.is_expired(self.expiry_margin) {
                return Ok(token.token.clone());
            }
        }

        self.refresh_locked(&mut state).await
    }

    /// Replace a token the API rejected with 401
    ///
    /// If another task already swapped in a different token, that token is
    /// returned without a second refresh.
    pub async fn refresh_after_unauthorized(&self, rejected: &str) -> Result<String> {
        if self.credential.is_static() {
            return Err(Error::auth(
                "Access token was rejected and no refresh token is configured",
            ));
        }

        let mut state = self.state.write().await;
        if let Some(token) = state.cached.as_ref() {
            if token.token != rejected && !token.is_expired(self.expiry_margin) {
                return Ok(token.token.clone());
            }
        }
        state.cached = None;

        self.refresh_locked(&mut state).await
    }

    /// Number of token refreshes performed so far
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Get the credential source
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Refresh while holding the write lock
    async fn refresh_locked(&self, state: &mut TokenState) -> Result<String> {
        let Credential::Refreshable {
            token_url,
            client_id,
            client_secret,
            ..
        } = &self.credential
        else {
            return Err(Error::auth("Static access tokens cannot be refreshed"));
        };

        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or_else(|| Error::auth("No refresh token available"))?;

        debug!("Refreshing OAuth access token");
        let response = self
            .fetch_oauth2_refresh(token_url, client_id, client_secret, &refresh_token)
            .await?;

        if let Some(rotated) = response.refresh_token.clone().filter(|t| !t.is_empty()) {
            state.refresh_token = Some(rotated);
        }
        let token = response.into_cached_token();
        let token_str = token.token.clone();
        info!(expires_at = ?token.expires_at, "Obtained new access token");
        state.cached = Some(token);
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        Ok(token_str)
    }

    /// Fetch OAuth2 token using refresh token flow
    async fn fetch_oauth2_refresh(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http_client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token refresh request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Refresh token request failed with status {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid token response: {e}")))
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("credential", &self.credential)
            .field("expiry_margin", &self.expiry_margin)
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        CachedToken::expires_in(
            self.access_token,
            self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        )
    }
}
