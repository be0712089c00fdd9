//! # Batch Assembler
//!
//! Splits processed rows into fixed-size chunks and writes each one as a CSV
//! object under `processed_data/`. Chunks are uploaded independently; one
//! failing does not stop the rest.

use crate::constants::{DEFAULT_CHUNK_SIZE, PROCESSED_DATA_PREFIX};
use crate::storage::ObjectStore;
use crate::types::ProcessedJob;
use csv::{QuoteStyle, WriterBuilder};
use tracing::{error, info};

/// Outcome of writing one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    /// 1-based position of the chunk.
    pub chunk: usize,
    pub key: String,
    pub rows: usize,
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn is_persisted(&self) -> bool {
        self.error.is_none()
    }
}

/// Serializes rows to CSV with a header and every field quoted.
pub fn to_csv(jobs: &[ProcessedJob]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    for job in jobs {
        writer.serialize(job)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// `processed_data/<stem>_<rows_so_far>.csv`, where `stem` is the input file
/// name without its directory and extension.
pub fn chunk_key(input_key: &str, rows_so_far: usize) -> String {
    let file_name = input_key.rsplit('/').next().unwrap_or(input_key);
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name);
    format!("{PROCESSED_DATA_PREFIX}{stem}_{rows_so_far}.csv")
}

#[derive(Debug, Clone)]
pub struct BatchAssembler {
    chunk_size: usize,
}

impl Default for BatchAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Writes every non-empty chunk of `jobs` to `store`.
    pub async fn emit(
        &self,
        store: &dyn ObjectStore,
        input_key: &str,
        jobs: &[ProcessedJob],
    ) -> Vec<ChunkReport> {
        let mut reports = Vec::new();
        let mut rows_so_far = 0;

        for (index, rows) in jobs.chunks(self.chunk_size).enumerate() {
            rows_so_far += rows.len();
            let chunk = index + 1;
            let key = chunk_key(input_key, rows_so_far);

            let result = match to_csv(rows) {
                Ok(body) => store.put(&key, body).await.map_err(|e| e.to_string()),
                Err(e) => Err(format!("Failed to encode CSV: {e}")),
            };

            match &result {
                Ok(()) => info!(chunk, key = %key, rows = rows.len(), "Uploaded chunk"),
                Err(e) => error!(chunk, key = %key, error = %e, "Failed to upload chunk"),
            }

            reports.push(ChunkReport {
                chunk,
                key,
                rows: rows.len(),
                error: result.err(),
            });
        }
        reports
    }
}
