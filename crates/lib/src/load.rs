//! # Load Stage
//!
//! Moves processed CSV chunks into the relational sink and archives each one
//! once its rows have landed.

use crate::constants::{ARCHIVE_PREFIX, PROCESSED_DATA_PREFIX};
use crate::errors::PipelineError;
use crate::sink::JobSink;
use crate::storage::{archive_object, latest_object, ObjectStore};
use crate::types::{ProcessedJob, OUTPUT_COLUMNS};
use chrono::Utc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub key: String,
    pub rows: usize,
    pub affected: u64,
    pub archived: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No processed CSV was waiting.
    NothingToDo,
    Loaded(LoadReport),
}

/// Parses a processed chunk, checking that every output column is present.
pub fn read_processed_csv(key: &str, body: &[u8]) -> Result<Vec<ProcessedJob>, PipelineError> {
    let mut reader = csv::Reader::from_reader(body);
    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = OUTPUT_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::InvalidInput {
            key: key.to_string(),
            reason: format!("missing required columns: {}", missing.join(", ")),
        });
    }

    Ok(reader
        .deserialize::<ProcessedJob>()
        .collect::<Result<Vec<_>, _>>()?)
}

/// Upserts the newest object under `processed_data/` into `sink`.
///
/// The CSV is archived only when at least one row was affected. A sink error
/// is returned as-is and leaves the CSV in place.
pub async fn load_latest(
    store: &dyn ObjectStore,
    sink: &dyn JobSink,
) -> Result<LoadOutcome, PipelineError> {
    let Some(latest) = latest_object(store, PROCESSED_DATA_PREFIX).await? else {
        warn!("No processed files found under '{PROCESSED_DATA_PREFIX}'");
        return Ok(LoadOutcome::NothingToDo);
    };
    if !latest.key.ends_with(".csv") {
        warn!(key = %latest.key, "Latest processed file is not a CSV; skipping");
        return Ok(LoadOutcome::NothingToDo);
    }

    Ok(LoadOutcome::Loaded(load_object(store, sink, latest.key).await?))
}

/// Upserts every CSV under `processed_data/`, oldest first.
///
/// Each file follows the `load_latest` archive rule. The first failure stops
/// the walk; files loaded before it stay archived.
pub async fn load_pending(
    store: &dyn ObjectStore,
    sink: &dyn JobSink,
) -> Result<Vec<LoadReport>, PipelineError> {
    let mut pending: Vec<_> = store
        .list(PROCESSED_DATA_PREFIX)
        .await?
        .into_iter()
        .filter(|object| object.key.ends_with(".csv"))
        .collect();
    if pending.is_empty() {
        warn!("No processed CSV files found under '{PROCESSED_DATA_PREFIX}'");
        return Ok(Vec::new());
    }
    pending.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut reports = Vec::with_capacity(pending.len());
    for object in pending {
        reports.push(load_object(store, sink, object.key).await?);
    }
    Ok(reports)
}

async fn load_object(
    store: &dyn ObjectStore,
    sink: &dyn JobSink,
    key: String,
) -> Result<LoadReport, PipelineError> {
    info!(key = %key, "Loading processed file");
    let body = store.get(&key).await?;
    let jobs = read_processed_csv(&key, &body)?;
    let affected = sink.upsert(&jobs, Utc::now()).await?;
    info!(key = %key, rows = jobs.len(), affected, "Upserted processed file");

    let archived = if affected > 0 {
        Some(archive_object(store, &key, PROCESSED_DATA_PREFIX, ARCHIVE_PREFIX).await?)
    } else {
        warn!(key = %key, "No rows affected; leaving file in place");
        None
    };

    Ok(LoadReport {
        key,
        rows: jobs.len(),
        affected,
        archived,
    })
}
