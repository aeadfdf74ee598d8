//! Remote clinic API client
//!
//! The remote API is the source of truth; this module only submits writes,
//! fetches entity lists, and answers a cheap reachability probe. Responses
//! on the write path are consumed for their status alone.

mod cache;
mod wire;

pub use cache::EntityCache;
pub use wire::form_fields;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::WriteMethod;
use crate::util::compact_text;

const CACHE_TTL_SECS: u64 = 60;
const PING_TIMEOUT_SECS: u64 = 4;

/// Port to the remote API, kept narrow so the sync engine can be exercised
/// against a scripted in-memory remote in tests.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Submit one write; only success/failure is reported
    async fn submit(
        &self,
        endpoint: &str,
        method: WriteMethod,
        fields: &[(String, String)],
    ) -> Result<()>;

    /// Fetch an entity list as JSON
    async fn fetch(&self, endpoint: &str) -> Result<Value>;

    /// Cheap reachability check; never errors
    async fn ping(&self) -> bool;
}

/// reqwest-backed implementation of `RemoteApi`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    cache: EntityCache,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
            cache: EntityCache::new(Duration::from_secs(CACHE_TTL_SECS)),
        })
    }

    /// The entity-list cache owned by this client.
    pub const fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Fetch an entity list through the cache.
    pub async fn cached_fetch(&self, endpoint: &str) -> Result<Value> {
        self.cache
            .get_or_fetch(endpoint, || self.fetch_uncached(endpoint))
            .await
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_uncached(&self, endpoint: &str) -> Result<Value> {
        let response = self
            .authorized(self.http.get(self.endpoint_url(endpoint)))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(endpoint, response).await);
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn submit(
        &self,
        endpoint: &str,
        method: WriteMethod,
        fields: &[(String, String)],
    ) -> Result<()> {
        let url = self.endpoint_url(endpoint);
        let request = match method {
            WriteMethod::Post => self.http.post(&url),
            WriteMethod::Put => self.http.put(&url),
            WriteMethod::Delete => self.http.delete(&url),
        };

        let response = self.authorized(request).form(&fields).send().await?;

        if !response.status().is_success() {
            return Err(api_error(endpoint, response).await);
        }

        Ok(())
    }

    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        self.fetch_uncached(endpoint).await
    }

    async fn ping(&self) -> bool {
        let request = self
            .authorized(self.http.get(self.endpoint_url("ping")))
            .timeout(Duration::from_secs(PING_TIMEOUT_SECS));

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn api_error(endpoint: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Api(format!("{endpoint}: {}", parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_api_error_prefers_structured_message() {
        let message = parse_api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message": "code already in use"}"#,
        );
        assert_eq!(message, "code already in use (422)");
    }

    #[test]
    fn parse_api_error_falls_back_to_body_text() {
        let message = parse_api_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(message, "upstream unavailable (502)");

        let message = parse_api_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(message, "HTTP 502");
    }

    #[test]
    fn endpoint_url_joins_without_double_slashes() {
        let config = crate::config::ApiConfig::new("https://api.clinic.example/").unwrap();
        let client = ApiClient::new(&config).unwrap();

        assert_eq!(
            client.endpoint_url("/patients"),
            "https://api.clinic.example/patients"
        );
        assert_eq!(
            client.endpoint_url("sessions/12/treatments"),
            "https://api.clinic.example/sessions/12/treatments"
        );
    }
}
