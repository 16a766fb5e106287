//! Remote counting client
//!
//! HTTP client for the counter API served by `pagecount-api` (or any
//! service speaking the same two endpoints).

use super::path::PageId;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the remote counter client
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the counter API, e.g. "https://example.com/counter-api"
    pub endpoint: String,
    /// Hostname reported as the `site` of every count
    pub site: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Client for the remote counter API
pub struct RemoteCounter {
    client: Client,
    endpoint: String,
    site: String,
}

#[derive(Debug, Serialize)]
struct IncrementRequest<'a> {
    page: &'a str,
    site: &'a str,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: Option<u64>,
}

impl RemoteCounter {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(RemoteError::InvalidEndpoint(config.endpoint));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            site: config.site,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// `POST <endpoint>/count` with `{page, site}`
    pub async fn increment(&self, page: &PageId) -> Result<u64, RemoteError> {
        let url = format!("{}/count", self.endpoint);
        let body = IncrementRequest {
            page: page.as_str(),
            site: &self.site,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        read_count(response).await
    }

    /// `GET <endpoint>/count/<page>?site=<host>` without counting a visit
    pub async fn fetch(&self, page: &PageId) -> Result<u64, RemoteError> {
        let url = self.lookup_url(page);

        let response = self.client.get(&url).send().await.map_err(classify)?;

        read_count(response).await
    }

    fn lookup_url(&self, page: &PageId) -> String {
        format!(
            "{}/count/{}?site={}",
            self.endpoint,
            urlencoding::encode(page.as_str()),
            urlencoding::encode(&self.site)
        )
    }
}

fn classify(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_connect() {
        RemoteError::Unavailable
    } else {
        RemoteError::Request(e)
    }
}

async fn read_count(response: reqwest::Response) -> Result<u64, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(RemoteError::ApiError {
            status: status.as_u16(),
            message: text,
        });
    }

    let data: CountResponse = response.json().await.map_err(classify)?;
    Ok(data.count.unwrap_or(0))
}

/// Errors that can occur when talking to the counter API
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Counter API unavailable")]
    Unavailable,

    #[error("Invalid counter API endpoint: {0:?}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,
}
