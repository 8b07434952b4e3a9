/// Deals Client Module
///
/// Executes one region search against the external deals API. Failures are
/// split into retryable (the next tick tries again) and fatal (needs operator
/// attention) so the worker never has to guess from exception text.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::types::{Region, SearchResults};

#[derive(Debug, Error)]
pub enum SearchError {
    /// Transient failure: rate limit, server error, network trouble.
    #[error("retryable search failure: {0}")]
    Retryable(String),

    /// Persistent failure: bad credentials, rejected request, broken payload.
    #[error("fatal search failure: {0}")]
    Fatal(String),
}

/// Contract the worker holds against the deals API.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    async fn search_region(&self, region: &Region) -> Result<SearchResults, SearchError>;
}

/// Thin HTTP client for the deals API: one items request per region search.
pub struct DealsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DealsApiClient {
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| SearchError::Fatal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.deals_api_url.trim_end_matches('/').to_string(),
            api_key: config.deals_api_key.clone(),
        })
    }
}

/// Map an unsuccessful API status onto the failure taxonomy.
fn classify_status(status: StatusCode, body: &str) -> SearchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SearchError::Retryable(format!("deals API returned {}: {}", status, body))
    } else {
        SearchError::Fatal(format!("deals API returned {}: {}", status, body))
    }
}

fn classify_transport(error: reqwest::Error) -> SearchError {
    if error.is_timeout() || error.is_connect() {
        SearchError::Retryable(format!("deals API unreachable: {}", error))
    } else {
        SearchError::Fatal(format!("deals API request failed: {}", error))
    }
}

#[async_trait]
impl SearchExecutor for DealsApiClient {
    async fn search_region(&self, region: &Region) -> Result<SearchResults, SearchError> {
        let url = format!("{}/items", self.base_url);

        log::debug!(
            "Searching region lat={} lon={} radius={}km",
            region.latitude,
            region.longitude,
            region.radius
        );

        let mut request = self.client.get(&url).query(&[
            ("latitude", region.latitude.to_string()),
            ("longitude", region.longitude.to_string()),
            ("radius", region.radius.to_string()),
        ]);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.trim()));
        }

        let response = request.send().await.map_err(classify_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let results: SearchResults = response
            .json()
            .await
            .map_err(|e| SearchError::Fatal(format!("Failed to parse deals API response: {}", e)))?;

        log::debug!("Deals API returned {} results", results.len());

        Ok(results)
    }
}
