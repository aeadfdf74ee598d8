//! Runtime configuration for the remote API connection.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

/// Connection settings for the clinic API.
///
/// Secret tokens come from the environment; they are never persisted in the
/// local database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote API (e.g. `https://api.clinic.example`)
    pub base_url: String,
    /// Optional bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Connectivity probe interval in seconds
    pub probe_interval_secs: u64,
}

impl ApiConfig {
    /// Create a configuration for the given base URL.
    ///
    /// The URL must carry an `http://` or `https://` scheme; a trailing
    /// slash is stripped so endpoints can be joined naively.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;

        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "API base URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
        })
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = normalize_text_option(Some(token.into()));
        self
    }

    #[must_use]
    pub const fn with_probe_interval(mut self, secs: u64) -> Self {
        self.probe_interval_secs = secs;
        self
    }

    /// Per-request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Probe interval as a `Duration`.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Read the configuration from `CHAIRSIDE_API_URL`,
    /// `CHAIRSIDE_API_TOKEN`, and `CHAIRSIDE_PROBE_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url = normalize_text_option(env::var("CHAIRSIDE_API_URL").ok()).ok_or_else(
            || Error::InvalidInput("CHAIRSIDE_API_URL is not set".to_string()),
        )?;

        let mut config = Self::new(base_url)?;

        if let Some(token) = normalize_text_option(env::var("CHAIRSIDE_API_TOKEN").ok()) {
            config = config.with_auth_token(token);
        }

        if let Some(raw) = normalize_text_option(env::var("CHAIRSIDE_PROBE_INTERVAL_SECS").ok()) {
            let secs = raw.parse::<u64>().map_err(|_| {
                Error::InvalidInput(format!(
                    "CHAIRSIDE_PROBE_INTERVAL_SECS must be a number of seconds, got: {raw}"
                ))
            })?;
            config = config.with_probe_interval(secs);
        }

        Ok(config)
    }
}
