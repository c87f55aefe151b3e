//! HTTP client for the daemon's API.

pub mod types;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use types::{ResetResponse, StatusResponse, TriggerResponse};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn get_status(&self) -> Result<StatusResponse> {
        self.decode(self.http.get(self.url("/api/status")).send().await)
            .await
    }

    pub async fn reset(&self) -> Result<ResetResponse> {
        self.decode(self.http.post(self.url("/api/reset")).send().await)
            .await
    }

    pub async fn mock_trigger(&self) -> Result<TriggerResponse> {
        self.decode(self.http.post(self.url("/api/mock_trigger")).send().await)
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Result<reqwest::Response>,
    ) -> Result<T> {
        let response = response.with_context(|| format!("cannot reach {}", self.base_url))?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}
