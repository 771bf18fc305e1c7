//! Relay address lookup.
//!
//! When `connect` is called without an address the socket asks its
//! [`AddressResolver`]. Any failure falls back to the configured default.

use std::time::Duration;

use async_trait::async_trait;
use lunchparty_shared::SocketConfig;
use reqwest::Client;
use url::Url;

use crate::config::DEFAULT_LOOKUP_TIMEOUT;
use crate::error::ResolveError;
use crate::retry::{retry_async, RetryPolicy};

#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, ResolveError>;
}

/// Always answers with the same address.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    address: String,
}

impl StaticResolver {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self) -> Result<String, ResolveError> {
        Ok(self.address.clone())
    }
}

/// Timeouts and retries for [`HttpResolver`].
#[derive(Debug, Clone)]
pub struct HttpResolverOptions {
    pub connect_timeout: Duration,
    /// Bound on one request, body included.
    pub attempt_timeout: Duration,
    pub policy: RetryPolicy,
}

impl Default for HttpResolverOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            attempt_timeout: DEFAULT_LOOKUP_TIMEOUT,
            policy: RetryPolicy::lookup(),
        }
    }
}

/// Reads `{"socket_url": "..."}` from a lookup endpoint.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    lookup_url: String,
    attempt_timeout: Duration,
    policy: RetryPolicy,
}

impl HttpResolver {
    pub fn new(lookup_url: impl Into<String>) -> Result<Self, ResolveError> {
        Self::with_options(lookup_url, HttpResolverOptions::default())
    }

    pub fn with_options(
        lookup_url: impl Into<String>,
        options: HttpResolverOptions,
    ) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            lookup_url: lookup_url.into(),
            attempt_timeout: options.attempt_timeout,
            policy: options.policy,
        })
    }

    async fn lookup_once(&self) -> Result<String, ResolveError> {
        let resp = self
            .client
            .get(&self.lookup_url)
            .timeout(self.attempt_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ResolveError::Status(resp.status().as_u16()));
        }
        let config: SocketConfig = resp.json().await?;
        validate_address(&config.socket_url)
    }
}

#[async_trait]
impl AddressResolver for HttpResolver {
    async fn resolve(&self) -> Result<String, ResolveError> {
        retry_async(
            &self.policy,
            |_| self.lookup_once(),
            ResolveError::is_retryable,
        )
        .await
    }
}

/// Accept absolute `http(s)`/`ws(s)` addresses only, without a trailing slash.
pub fn validate_address(address: &str) -> Result<String, ResolveError> {
    let trimmed = address.trim();
    let url =
        Url::parse(trimmed).map_err(|_| ResolveError::InvalidAddress(trimmed.to_string()))?;
    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(ResolveError::InvalidAddress(trimmed.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
