use super::{sql, JobSink, SinkError};
use crate::types::ProcessedJob;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::{self, Debug};
use tracing::{info, warn};
use turso::{Database, Value as TursoValue};

/// A [`JobSink`] backed by a local SQLite database through Turso.
///
/// Cloning shares the underlying database, so an in-memory sink can be
/// inspected from tests.
#[derive(Clone)]
pub struct SqliteJobSink {
    pub db: Database,
}

impl SqliteJobSink {
    /// Opens (or creates) the database at `db_path` and ensures the schema.
    /// Use ":memory:" for an isolated in-memory database.
    pub async fn new(db_path: &str) -> Result<Self, SinkError> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && db_path != ":memory:" {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SinkError::Connection(e.to_string()))?;
            }
        }
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        let sink = Self { db };
        sink.initialize_schema().await?;
        Ok(sink)
    }

    /// Creates the `job_data` table if it does not exist.
    pub async fn initialize_schema(&self) -> Result<(), SinkError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        conn.execute(sql::CREATE_JOB_DATA_TABLE, ()).await?;
        Ok(())
    }
}

impl Debug for SqliteJobSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteJobSink").finish_non_exhaustive()
    }
}

fn text(value: &str) -> TursoValue {
    TursoValue::Text(value.to_string())
}

fn optional_text(value: &Option<String>) -> TursoValue {
    value.as_deref().map(text).unwrap_or(TursoValue::Null)
}

fn optional_real(value: Option<f64>) -> TursoValue {
    value.map(TursoValue::Real).unwrap_or(TursoValue::Null)
}

fn timestamp(value: &DateTime<Utc>) -> TursoValue {
    TursoValue::Text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Row parameters in `OUTPUT_COLUMNS` order.
fn row_params(job: &ProcessedJob, loaded_at: &DateTime<Utc>) -> Vec<TursoValue> {
    vec![
        text(&job.job_title),
        text(&job.employer_name),
        text(&job.job_employment_type),
        text(&job.job_application_link),
        text(&job.job_description),
        TursoValue::Integer(i64::from(job.job_is_remote)),
        text(&job.job_location),
        text(&job.job_city),
        text(&job.job_state),
        text(&job.job_country),
        optional_text(&job.job_benefits),
        optional_real(job.job_salary),
        optional_real(job.job_min_salary),
        optional_real(job.job_max_salary),
        optional_text(&job.job_highlights),
        optional_text(&job.job_responsibilities),
        job.date_posted
            .as_ref()
            .map(timestamp)
            .unwrap_or(TursoValue::Null),
        text(&job.job_hash),
        timestamp(loaded_at),
    ]
}

#[async_trait]
impl JobSink for SqliteJobSink {
    async fn upsert(
        &self,
        jobs: &[ProcessedJob],
        loaded_at: DateTime<Utc>,
    ) -> Result<u64, SinkError> {
        if jobs.is_empty() {
            warn!("No data to insert");
            return Ok(0);
        }

        let conn = self
            .db
            .connect()
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let upsert_sql = sql::upsert_job_data();
        let mut stmt = match conn.prepare(&upsert_sql).await {
            Ok(stmt) => stmt,
            Err(e) => {
                conn.execute("ROLLBACK", ()).await?;
                return Err(SinkError::Database(e));
            }
        };

        let mut affected = 0;
        for job in jobs {
            match stmt.execute(row_params(job, &loaded_at)).await {
                Ok(changes) => affected += changes,
                Err(e) => {
                    warn!(job_hash = %job.job_hash, "Failed to upsert row: {e:?}. Rolling back transaction.");
                    conn.execute("ROLLBACK", ()).await?;
                    return Err(SinkError::Database(e));
                }
            }
        }

        conn.execute("COMMIT", ()).await?;
        info!("Successfully upserted {affected} records");
        Ok(affected)
    }
}
