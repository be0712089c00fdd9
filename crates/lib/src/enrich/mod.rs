//! # Enrichment Client
//!
//! Restructures a job's free-text fields into four sections by calling a
//! text-generation provider. Calls go through a bounded [`ResponseCache`], are
//! retried a fixed number of times, and never fail: exhausted retries pass the
//! input text through as the description.

pub mod cache;
pub mod parse;

pub use cache::ResponseCache;
pub use parse::{parse_enriched_response, strip_code_fences};

use crate::constants::{DEFAULT_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, MAX_RETRY_BACKOFF_MS};
use crate::prompts::enrichment::{
    render_job_prompt, JOB_SUMMARY_SYSTEM_PROMPT, JOB_SUMMARY_USER_PROMPT,
};
use crate::providers::ai::{AiProvider, GenerationParams};
use crate::types::EnrichedFields;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for the enrichment client.
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Total number of provider calls per request, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt.
    pub retry_backoff: Duration,
    pub params: GenerationParams,
    pub system_prompt: String,
    /// User prompt with a `{job_json}` placeholder.
    pub user_prompt_template: String,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            params: GenerationParams::default(),
            system_prompt: JOB_SUMMARY_SYSTEM_PROMPT.to_string(),
            user_prompt_template: JOB_SUMMARY_USER_PROMPT.to_string(),
        }
    }
}

/// How an enrichment result was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// The service response parsed cleanly.
    Enriched { cached: bool },
    /// The input was blank; no call was made.
    SkippedEmpty,
    /// Every attempt failed; the input text was passed through.
    FallbackUsed { attempts: u32, last_error: String },
    /// The service answered but the answer was not the expected JSON; the
    /// input text was passed through.
    ParseFailed { reason: String },
}

/// The sections for one job together with how they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub fields: EnrichedFields,
    pub status: EnrichmentStatus,
}

/// Counters over the enrichment statuses of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub enriched: usize,
    pub cache_hits: usize,
    pub skipped_empty: usize,
    pub fallbacks: usize,
    pub parse_failures: usize,
}

impl EnrichmentStats {
    pub fn record(&mut self, status: &EnrichmentStatus) {
        match status {
            EnrichmentStatus::Enriched { cached } => {
                self.enriched += 1;
                if *cached {
                    self.cache_hits += 1;
                }
            }
            EnrichmentStatus::SkippedEmpty => self.skipped_empty += 1,
            EnrichmentStatus::FallbackUsed { .. } => self.fallbacks += 1,
            EnrichmentStatus::ParseFailed { .. } => self.parse_failures += 1,
        }
    }
}

/// Client that turns job payloads into [`EnrichedFields`].
#[derive(Debug, Clone)]
pub struct Enricher {
    provider: Box<dyn AiProvider>,
    cache: Arc<ResponseCache>,
    options: EnrichmentOptions,
}

impl Enricher {
    pub fn new(
        provider: Box<dyn AiProvider>,
        cache: Arc<ResponseCache>,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            provider,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn options(&self) -> &EnrichmentOptions {
        &self.options
    }

    /// Enriches one job payload using the configured prompt.
    pub async fn enrich(&self, job_json: &str) -> Enrichment {
        self.simplify_text(&self.options.user_prompt_template, job_json)
            .await
    }

    /// Sends `text` through `template` and parses the answer into sections.
    pub async fn simplify_text(&self, template: &str, text: &str) -> Enrichment {
        if text.trim().is_empty() {
            debug!("Empty text received; skipping enrichment.");
            return Enrichment {
                fields: EnrichedFields::passthrough(text),
                status: EnrichmentStatus::SkippedEmpty,
            };
        }

        let params = &self.options.params;
        let cache_key = ResponseCache::key(template, text, params);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Cache hit for enrichment response");
            return Self::from_response(&cached, text, true);
        }

        let full_prompt = render_job_prompt(template, text);
        let attempts = self.options.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self
                .provider
                .generate(&self.options.system_prompt, &full_prompt, params)
                .await
            {
                Ok(response) => {
                    info!(attempt, "Received enrichment response");
                    self.cache.insert(cache_key, response.clone());
                    return Self::from_response(&response, text, false);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Enrichment attempt failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        let delay = self.backoff(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        warn!(attempts, "All enrichment retries exhausted, passing original text through");
        Enrichment {
            fields: EnrichedFields::passthrough(text),
            status: EnrichmentStatus::FallbackUsed {
                attempts,
                last_error,
            },
        }
    }

    fn from_response(response: &str, text: &str, cached: bool) -> Enrichment {
        match parse_enriched_response(response) {
            Ok(fields) => Enrichment {
                fields,
                status: EnrichmentStatus::Enriched { cached },
            },
            Err(e) => {
                warn!(error = %e, "Enrichment response could not be parsed");
                Enrichment {
                    fields: EnrichedFields::passthrough(text),
                    status: EnrichmentStatus::ParseFailed {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        retry_delay(self.options.retry_backoff, attempt)
    }
}

/// `base` doubled for each attempt after the first, capped at
/// `MAX_RETRY_BACKOFF_MS`.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
        .min(Duration::from_millis(MAX_RETRY_BACKOFF_MS))
}
