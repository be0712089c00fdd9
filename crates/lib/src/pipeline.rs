//! # Pipeline Orchestrator
//!
//! One run of the process stage:
//! `LOCATE_INPUT -> LOAD_INPUT -> CLEAN+HASH -> ENRICH -> ASSEMBLE+EMIT -> DONE`.
//! A missing input ends the run without error; a malformed input aborts it
//! before anything is written. Job and chunk failures are recorded in the
//! [`RunReport`] and never abort the run.

use crate::assemble::{BatchAssembler, ChunkReport};
use crate::constants::{ARCHIVE_PREFIX, INPUT_DATA_FIELD, RAW_DATA_PREFIX};
use crate::enrich::EnrichmentStats;
use crate::errors::PipelineError;
use crate::processor::JobProcessor;
use crate::storage::{archive_object, latest_object, ObjectStore};
use crate::types::json_kind;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub input_key: String,
    pub total_jobs: usize,
    pub processed_jobs: usize,
    pub dropped_jobs: usize,
    pub enrichment: EnrichmentStats,
    pub chunks: Vec<ChunkReport>,
    /// Where the input was moved to, if it was archived.
    pub archived: Option<String>,
}

impl RunReport {
    /// True when every chunk was persisted.
    pub fn is_success(&self) -> bool {
        self.chunks.iter().all(ChunkReport::is_persisted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No input artifact was found.
    NothingToDo,
    Completed(RunReport),
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    processor: JobProcessor,
    assembler: BatchAssembler,
    archive_input: bool,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: JobProcessor,
        assembler: BatchAssembler,
        archive_input: bool,
    ) -> Self {
        Self {
            store,
            processor,
            assembler,
            archive_input,
        }
    }

    /// Processes the newest raw artifact.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let Some(input) = latest_object(self.store.as_ref(), RAW_DATA_PREFIX).await? else {
            warn!("No raw data files found under '{RAW_DATA_PREFIX}'; nothing to do");
            return Ok(RunOutcome::NothingToDo);
        };
        info!(key = %input.key, "Processing input artifact");

        let raws = match self.load_input(&input.key).await {
            Ok(raws) => raws,
            Err(e) => {
                error!(key = %input.key, error = %e, "Aborting run on invalid input");
                return Err(e);
            }
        };
        let total_jobs = raws.len();

        let batch = self.processor.process_batch(raws).await;
        let chunks = self
            .assembler
            .emit(self.store.as_ref(), &input.key, &batch.jobs)
            .await;

        let mut report = RunReport {
            input_key: input.key.clone(),
            total_jobs,
            processed_jobs: batch.jobs.len(),
            dropped_jobs: batch.dropped,
            enrichment: batch.enrichment,
            chunks,
            archived: None,
        };

        if self.archive_input && report.is_success() {
            match archive_object(self.store.as_ref(), &input.key, RAW_DATA_PREFIX, ARCHIVE_PREFIX)
                .await
            {
                Ok(archive_key) => report.archived = Some(archive_key),
                Err(e) => warn!(key = %input.key, error = %e, "Failed to archive input"),
            }
        }

        info!(
            processed = report.processed_jobs,
            total = report.total_jobs,
            "Processed {}/{} jobs",
            report.processed_jobs,
            report.total_jobs
        );
        if !report.is_success() {
            error!(
                failed_chunks = report.chunks.iter().filter(|c| !c.is_persisted()).count(),
                "Some chunks were not persisted"
            );
        }
        Ok(RunOutcome::Completed(report))
    }

    /// Reads `key` and returns the records of its top-level job list.
    async fn load_input(&self, key: &str) -> Result<Vec<Value>, PipelineError> {
        let body = self.store.get(key).await?;
        let invalid = |reason: String| PipelineError::InvalidInput {
            key: key.to_string(),
            reason,
        };

        let document: Value = serde_json::from_slice(&body)
            .map_err(|e| invalid(format!("not valid JSON: {e}")))?;
        match document {
            Value::Object(mut map) => match map.remove(INPUT_DATA_FIELD) {
                Some(Value::Array(raws)) => Ok(raws),
                Some(other) => Err(invalid(format!(
                    "'{INPUT_DATA_FIELD}' is {}, expected a list",
                    json_kind(&other)
                ))),
                None => Err(invalid(format!("missing '{INPUT_DATA_FIELD}' field"))),
            },
            other => Err(invalid(format!(
                "top level is {}, expected an object",
                json_kind(&other)
            ))),
        }
    }
}
