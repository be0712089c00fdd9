//! # Relational Sink
//!
//! Destination for processed rows. Rows are upserted by `job_hash`: a row whose
//! hash already exists overwrites every other column and refreshes
//! `integrated_timestamp`.

pub mod sql;
pub mod sqlite;

pub use sqlite::SqliteJobSink;

use crate::types::ProcessedJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Failed to get database connection: {0}")]
    Connection(String),
}

#[async_trait]
pub trait JobSink: Send + Sync + Debug {
    /// Inserts or updates `jobs`, stamping them with `loaded_at`.
    /// Returns the number of affected rows.
    async fn upsert(
        &self,
        jobs: &[ProcessedJob],
        loaded_at: DateTime<Utc>,
    ) -> Result<u64, SinkError>;
}
