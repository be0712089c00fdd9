//! # Job Processor
//!
//! Turns raw records into [`ProcessedJob`] rows: hash, clean, enrich, assemble.
//! A batch is fanned out with at most `max_concurrency` jobs in flight; since
//! enrichment is the only step that suspends, this caps concurrent calls to
//! the text-generation service.

use crate::clean::clean_with_report;
use crate::constants::DEFAULT_MAX_CONCURRENCY;
use crate::enrich::{Enricher, EnrichmentStats, EnrichmentStatus};
use crate::hash::{job_identity, IdentityPolicy};
use crate::types::{json_kind, ProcessedJob, RawJob};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failures that drop a single job from the batch.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Job record is {0}, expected an object")]
    NotAnObject(&'static str),
    #[error("Enrichment response could not be parsed: {0}")]
    UnparsableEnrichment(String),
}

/// What to do with a job whose enrichment response was not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Keep the job with the pass-through description.
    #[default]
    KeepPartial,
    /// Drop the job.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub max_concurrency: usize,
    pub identity: IdentityPolicy,
    pub on_parse_failure: ParseFailurePolicy,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            identity: IdentityPolicy::default(),
            on_parse_failure: ParseFailurePolicy::default(),
        }
    }
}

/// The surviving rows of a batch and what happened to the rest.
#[derive(Debug, Clone, Default)]
pub struct ProcessedBatch {
    pub jobs: Vec<ProcessedJob>,
    pub dropped: usize,
    pub enrichment: EnrichmentStats,
}

#[derive(Debug, Clone)]
pub struct JobProcessor {
    enricher: Enricher,
    options: ProcessorOptions,
}

impl JobProcessor {
    pub fn new(enricher: Enricher, options: ProcessorOptions) -> Self {
        Self { enricher, options }
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Processes one raw record. The returned status is `None` only when the
    /// job never reached enrichment.
    pub async fn process_job(
        &self,
        raw: Value,
        integrated_timestamp: DateTime<Utc>,
    ) -> (Result<ProcessedJob, JobError>, Option<EnrichmentStatus>) {
        let raw = match RawJob::try_from(raw) {
            Ok(raw) => raw,
            Err(kind) => return (Err(JobError::NotAnObject(kind)), None),
        };

        let job_hash = job_identity(&raw, self.options.identity);
        let (cleaned, report) = clean_with_report(raw);
        if report.is_degraded() {
            debug!(job_id = %job_hash, ?report, "Job fields were degraded during cleaning");
        }

        let enrichment = self.enricher.enrich(&cleaned.enrichment_input()).await;
        match &enrichment.status {
            EnrichmentStatus::FallbackUsed { attempts, last_error } => {
                warn!(job_id = %job_hash, attempts, last_error = %last_error, "Enrichment fell back to original text");
            }
            EnrichmentStatus::ParseFailed { reason }
                if self.options.on_parse_failure == ParseFailurePolicy::Skip =>
            {
                return (
                    Err(JobError::UnparsableEnrichment(reason.clone())),
                    Some(enrichment.status),
                );
            }
            _ => {}
        }

        let job = ProcessedJob::assemble(cleaned, enrichment.fields, job_hash, integrated_timestamp);
        (Ok(job), Some(enrichment.status))
    }

    /// Processes a whole batch. Output order is not meaningful.
    pub async fn process_batch(&self, raws: Vec<Value>) -> ProcessedBatch {
        let integrated_timestamp = Utc::now();
        let concurrency = self.options.max_concurrency.max(1);

        let mut results = stream::iter(raws.into_iter().enumerate())
            .map(|(index, raw)| {
                let label = source_label(&raw, index);
                async move {
                    let (result, status) = self.process_job(raw, integrated_timestamp).await;
                    (label, result, status)
                }
            })
            .buffer_unordered(concurrency);

        let mut batch = ProcessedBatch::default();
        while let Some((label, result, status)) = results.next().await {
            if let Some(status) = &status {
                batch.enrichment.record(status);
            }
            match result {
                Ok(job) => batch.jobs.push(job),
                Err(e) => {
                    error!(job_id = %label, error = %e, "Dropping job");
                    batch.dropped += 1;
                }
            }
        }
        batch
    }
}

/// Identifies a record in logs: its `job_id` when present, else its position.
fn source_label(raw: &Value, index: usize) -> String {
    match raw.get("job_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        _ => format!("#{index} ({})", json_kind(raw)),
    }
}
