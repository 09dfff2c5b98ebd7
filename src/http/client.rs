//! HTTP client with retry and rate limiting
//!
//! Provides the HTTP client every API call goes through. It handles:
//! - Bearer authentication from the credential manager
//! - One forced token refresh and replay on 401
//! - Retries with exponential backoff on 429/5xx and transport failures,
//!   honoring `Retry-After`
//! - Rate limiting to stay under the API quota
//! - JSON decoding of response bodies

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::CredentialManager;
use crate::error::{is_retryable_status, Error, Result};
use crate::types::{BackoffType, Method, StringMap};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Multiplier for exponential backoff
    pub backoff_factor: u32,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            backoff_factor: 2,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("hubspot-tap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the exponential backoff multiplier
    pub fn backoff_factor(mut self, factor: u32) -> Self {
        self.config.backoff_factor = factor.max(1);
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: StringMap,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Override max retries for this request
    pub max_retries: Option<u32>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set max retries
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// A decoded API response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body (`Null` for an empty body)
    pub body: Value,
    /// Response headers
    pub headers: HeaderMap,
}

/// HTTP client with auth, retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    credentials: Option<Arc<CredentialManager>>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            credentials: None,
            rate_limiter,
        })
    }

    /// Create a client that authenticates every request
    pub fn with_credentials(
        config: HttpClientConfig,
        credentials: Arc<CredentialManager>,
    ) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.credentials = Some(credentials);
        Ok(client)
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the credential manager, if any
    pub fn credentials(&self) -> Option<&Arc<CredentialManager>> {
        self.credentials.as_ref()
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json(&self, url: &str, config: RequestConfig) -> Result<Value> {
        Ok(self.request(Method::GET, url, config).await?.body)
    }

    /// Make a POST request and decode the JSON body
    pub async fn post_json(&self, url: &str, body: Value) -> Result<Value> {
        Ok(self
            .request(Method::POST, url, RequestConfig::new().json(body))
            .await?
            .body)
    }

    /// Make a request, retrying transient failures
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse> {
        let full_url = self.build_url(url);
        let max_retries = config.max_retries.unwrap_or(self.config.max_retries);

        let mut attempt = 0;
        let mut reauthenticated = false;
        let mut token = match &self.credentials {
            Some(credentials) => Some(credentials.get_valid_token().await?),
            None => None,
        };

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.request(method.into(), &full_url);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            for (key, value) in &config.headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !config.query.is_empty() {
                req = req.query(&config.query);
            }
            if let Some(ref body) = config.body {
                req = req.json(body);
            }
            if let Some(ref token) = token {
                req = req.bearer_auth(token);
            }

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Transport error ({e}), attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(Error::Transient {
                        attempts: attempt + 1,
                        status: None,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(Error::Http(e)),
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                match (&self.credentials, &token) {
                    (Some(credentials), Some(rejected)) if !reauthenticated => {
                        warn!("Received 401 for {full_url}, refreshing token and retrying once");
                        reauthenticated = true;
                        token = Some(credentials.refresh_after_unauthorized(rejected).await?);
                        continue;
                    }
                    _ => {
                        return Err(Error::auth(format!(
                            "Request to {full_url} unauthorized (401): {body}"
                        )));
                    }
                }
            }

            if is_retryable_status(status.as_u16()) {
                if attempt < max_retries {
                    let delay = extract_retry_after(&response)
                        .map(|d| d.min(self.config.max_backoff))
                        .unwrap_or_else(|| self.calculate_backoff(attempt));
                    warn!(
                        "Request failed with {}, attempt {}/{}, retrying in {:?}",
                        status.as_u16(),
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Transient {
                    attempts: attempt + 1,
                    status: Some(status.as_u16()),
                    message: format!("HTTP {}: {body}", status.as_u16()),
                });
            }

            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::client(status.as_u16(), body));
            }

            debug!("Request succeeded: {} {}", method_name(method), full_url);
            return decode_response(response).await;
        }
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = self.config.backoff_factor.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_credentials", &self.credentials.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Read and decode a successful response
async fn decode_response(response: Response) -> Result<ApiResponse> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let text = response
        .text()
        .await
        .map_err(|e| Error::protocol(format!("Failed to read response body: {e}")))?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)
            .map_err(|e| Error::protocol(format!("Response is not valid JSON: {e}")))?
    };

    Ok(ApiResponse {
        status,
        body,
        headers,
    })
}

/// Extract the `Retry-After` delay (seconds form)
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::GET => "GET",
        Method::POST => "POST",
    }
}
