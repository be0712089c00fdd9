//! SQL for the `job_data` table.

use crate::types::OUTPUT_COLUMNS;

pub const CREATE_JOB_DATA_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS job_data (
        job_title TEXT NOT NULL,
        employer_name TEXT NOT NULL,
        job_employment_type TEXT NOT NULL,
        job_application_link TEXT NOT NULL,
        job_description TEXT NOT NULL,
        job_is_remote INTEGER NOT NULL DEFAULT 0,
        job_location TEXT NOT NULL,
        job_city TEXT NOT NULL,
        job_state TEXT NOT NULL,
        job_country TEXT NOT NULL,
        job_benefits TEXT,
        job_salary REAL,
        job_min_salary REAL,
        job_max_salary REAL,
        job_highlights TEXT,
        job_responsibilities TEXT,
        date_posted TEXT,
        job_hash TEXT PRIMARY KEY,
        integrated_timestamp TEXT NOT NULL
    );
";

/// `INSERT ... ON CONFLICT(job_hash) DO UPDATE` over every output column.
pub fn upsert_job_data() -> String {
    let columns = OUTPUT_COLUMNS.join(", ");
    let placeholders = vec!["?"; OUTPUT_COLUMNS.len()].join(", ");
    let updates = OUTPUT_COLUMNS
        .iter()
        .filter(|column| **column != "job_hash")
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO job_data ({columns}) VALUES ({placeholders}) \
         ON CONFLICT(job_hash) DO UPDATE SET {updates}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_updates_every_non_key_column() {
        let sql = upsert_job_data();
        assert!(sql.contains("ON CONFLICT(job_hash) DO UPDATE SET"));
        assert!(sql.contains("job_title = excluded.job_title"));
        assert!(sql.contains("integrated_timestamp = excluded.integrated_timestamp"));
        assert!(!sql.contains("job_hash = excluded.job_hash"));
        assert_eq!(sql.matches('?').count(), OUTPUT_COLUMNS.len());
    }
}
