#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Mock providers and sinks plus small builders shared by the integration
//! tests, so each test runs without network access or a real database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobflow::enrich::{Enricher, EnrichmentOptions, ResponseCache};
use jobflow::providers::ai::{AiProvider, GenerationParams};
use jobflow::sink::{JobSink, SinkError};
use jobflow::storage::ObjectStore;
use jobflow::types::ProcessedJob;
use jobflow::ProviderError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once, RwLock};
use std::time::Duration;

static INIT: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A fixed, well-formed four-section enrichment answer.
pub const ENRICHED_RESPONSE: &str = r#"```json
{
  "Job Description": "Build and operate batch data pipelines.",
  "Qualifications Needed": ["SQL", "Python"],
  "Job Responsibilities": ["Own the ETL", "Review code"],
  "Job Benefits": ["Health insurance"]
}
```"#;

// --- Mock AI Provider ---

/// Returns scripted responses in order, then `default_response`. Every call
/// is recorded. When `fail` is set every call errors instead.
#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<(String, String)>>>,
    pub responses: Arc<RwLock<Vec<String>>>,
    pub default_response: String,
    pub fail: bool,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl MockAiProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(responses.into_iter().rev().collect())),
            default_response: ENRICHED_RESPONSE.to_string(),
            fail: false,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Answers every unscripted call with `response`.
    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Holds each call open for `delay` so overlapping calls can be observed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.call_history.read().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        self.call_history
            .write()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(ProviderError::AiApi {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let scripted = self.responses.write().unwrap().pop();
        Ok(scripted.unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Enrichment options with no retry delay.
pub fn fast_options() -> EnrichmentOptions {
    EnrichmentOptions {
        retry_backoff: Duration::ZERO,
        ..EnrichmentOptions::default()
    }
}

pub fn enricher_with(provider: MockAiProvider) -> Enricher {
    Enricher::new(
        Box::new(provider),
        Arc::new(ResponseCache::new(1000)),
        fast_options(),
    )
}

// --- Mock Sinks ---

/// A sink that always fails.
#[derive(Debug, Default)]
pub struct FailingSink;

#[async_trait]
impl JobSink for FailingSink {
    async fn upsert(
        &self,
        _jobs: &[ProcessedJob],
        _loaded_at: DateTime<Utc>,
    ) -> Result<u64, SinkError> {
        Err(SinkError::Connection("database is down".to_string()))
    }
}

// --- Builders ---

/// The single Acme job used by the end-to-end scenarios.
pub fn acme_job() -> Value {
    json!({
        "job_title": "Data Engineer",
        "employer_name": "Acme",
        "job_apply_link": "https://acme.co/apply",
        "job_posted_at_datetime_utc": "2024-01-05T00:00:00Z",
        "job_salary": "$120,000"
    })
}

/// `count` distinct jobs.
pub fn numbered_jobs(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "job_title": format!("Data Engineer {i}"),
                "employer_name": "Acme",
                "job_description": format!("Build pipeline number {i}"),
            })
        })
        .collect()
}

/// Writes `{"data": jobs}` to `key`.
pub async fn put_raw_batch(store: &dyn ObjectStore, key: &str, jobs: Vec<Value>) {
    let body = serde_json::to_vec(&json!({ "status": "OK", "data": jobs })).unwrap();
    store.put(key, body).await.unwrap();
}
