//! # Fetch Stage
//!
//! Pulls one page range of job postings from the job-search API and stores the
//! response body under `raw_data/`.

use crate::constants::{
    DEFAULT_SEARCH_API_HOST, DEFAULT_SEARCH_API_URL, DEFAULT_SEARCH_TIMEOUT_SECS, INPUT_DATA_FIELD,
    RAW_DATA_PREFIX,
};
use crate::storage::{ObjectStore, StoreError};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Job search API key is missing")]
    MissingApiKey,
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to job search API: {0}")]
    Request(reqwest::Error),
    #[error("Job search API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Job search API returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("Failed to store fetched jobs: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(_) => true,
            FetchError::Status { status, .. } => RETRY_STATUS_CODES.contains(status),
            _ => false,
        }
    }
}

/// Query parameters sent with every search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: String,
    pub location: String,
    pub page: u32,
    pub num_pages: u32,
    pub country: String,
    pub date_posted: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: "Data Engineer".to_string(),
            location: "USA".to_string(),
            page: 1,
            num_pages: 2,
            country: "us".to_string(),
            date_posted: "all".to_string(),
        }
    }
}

/// Connection and retry settings for [`JobSearchClient`].
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_host: String,
    pub timeout: Duration,
    pub attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SEARCH_API_URL.to_string(),
            api_key: None,
            api_host: DEFAULT_SEARCH_API_HOST.to_string(),
            timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            attempts: 3,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobSearchClient {
    client: Client,
    api_url: String,
    api_key: String,
    api_host: String,
    attempts: u32,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl JobSearchClient {
    pub fn new(settings: SearchSettings) -> Result<Self, FetchError> {
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(FetchError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(FetchError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url: settings.api_url,
            api_key,
            api_host: settings.api_host,
            attempts: settings.attempts.max(1),
            min_backoff: settings.min_backoff,
            max_backoff: settings.max_backoff,
        })
    }

    /// Runs the search, retrying network errors and throttling/server statuses.
    pub async fn fetch_jobs(&self, params: &SearchParams) -> Result<Value, FetchError> {
        info!(query = %params.query, "Initiating job data fetch");
        let mut attempt = 1;
        loop {
            match self.fetch_once(params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, error = %e, "Retryable job search error; retrying in {delay:?}");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Job search request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(&self, params: &SearchParams) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(&self.api_url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        debug!(status = status.as_u16(), "Job search response received");
        let body = response.text().await.map_err(FetchError::Request)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Fetches one response and writes it to `raw_data/jobs_<YYYYmmdd_HHMMSS>.json`.
/// Returns the object key.
pub async fn fetch_to_store(
    client: &JobSearchClient,
    params: &SearchParams,
    store: &dyn ObjectStore,
) -> Result<String, FetchError> {
    let response = client.fetch_jobs(params).await?;
    let count = response
        .get(INPUT_DATA_FIELD)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    info!(count, "Received job listings");

    let key = format!(
        "{RAW_DATA_PREFIX}jobs_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let body = serde_json::to_vec(&response)
        .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    store.put(&key, body).await?;
    info!(key = %key, "Stored raw job data");
    Ok(key)
}
