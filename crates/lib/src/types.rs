//! # Job Records
//!
//! The three shapes a job takes on its way through the pipeline: the untrusted
//! [`RawJob`] read from the feed, the type-normalized [`CleanedJob`], and the
//! [`ProcessedJob`] row that is written to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Output column order shared by the CSV artifacts and the `job_data` table.
pub const OUTPUT_COLUMNS: [&str; 19] = [
    "job_title",
    "employer_name",
    "job_employment_type",
    "job_application_link",
    "job_description",
    "job_is_remote",
    "job_location",
    "job_city",
    "job_state",
    "job_country",
    "job_benefits",
    "job_salary",
    "job_min_salary",
    "job_max_salary",
    "job_highlights",
    "job_responsibilities",
    "date_posted",
    "job_hash",
    "integrated_timestamp",
];

/// A schema-less job record as delivered by the source feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawJob(pub Map<String, Value>);

impl RawJob {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the field as text. Strings are returned as-is and numbers use
    /// their JSON rendering; `null`, booleans and structures yield `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Like [`RawJob::text`] but absent values become an empty string.
    pub fn text_or_empty(&self, key: &str) -> String {
        self.text(key).unwrap_or_default()
    }

    /// The identifier the source assigned to this job, if it sent a usable one.
    pub fn source_id(&self) -> Option<&str> {
        match self.0.get("job_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.as_str()),
            _ => None,
        }
    }
}

impl TryFrom<Value> for RawJob {
    type Error = &'static str;

    /// Accepts JSON objects only; the error names the kind that was found instead.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(RawJob(map)),
            other => Err(json_kind(&other)),
        }
    }
}

/// A short name for the kind of a JSON value, used in error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A job whose identity and scalar fields have been normalized.
///
/// Every field is present; absent text is an empty string and unparsable
/// numbers and dates are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedJob {
    pub job_title: String,
    pub employer_name: String,
    pub job_employment_type: String,
    /// A validated URL or [`crate::constants::INVALID_URL`].
    pub job_application_link: String,
    pub job_is_remote: bool,
    pub job_location: String,
    pub job_city: String,
    pub job_state: String,
    pub job_country: String,
    pub date_posted: Option<DateTime<Utc>>,
    pub job_salary: Option<f64>,
    pub job_min_salary: Option<f64>,
    pub job_max_salary: Option<f64>,
    /// Raw free-text description, kept for enrichment.
    pub job_description: String,
    /// The highlights structure with the responsibilities list removed.
    pub job_highlights: Map<String, Value>,
    /// Responsibilities extracted from the highlights structure.
    pub responsibilities: Vec<String>,
    pub job_benefits: Value,
    pub source_id: Option<String>,
}

impl CleanedJob {
    /// Builds the JSON document that is handed to the enrichment service.
    pub fn enrichment_input(&self) -> String {
        let payload = json!({
            "job_description": self.job_description,
            "job_highlights": self.job_highlights,
            "job_requirements": self.responsibilities.join(" "),
            "job_benefits": self.job_benefits,
        });
        serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
    }
}

/// The four sections produced by the enrichment service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedFields {
    pub job_description: String,
    pub qualifications_needed: String,
    pub job_responsibilities: String,
    pub job_benefits: String,
}

impl EnrichedFields {
    /// Passes the input through untouched as the description.
    pub fn passthrough(text: &str) -> Self {
        Self {
            job_description: text.to_string(),
            ..Default::default()
        }
    }
}

/// One output row: cleaned fields, enriched sections, identity and load time.
///
/// Field order is the column order of [`OUTPUT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedJob {
    pub job_title: String,
    pub employer_name: String,
    pub job_employment_type: String,
    pub job_application_link: String,
    pub job_description: String,
    pub job_is_remote: bool,
    pub job_location: String,
    pub job_city: String,
    pub job_state: String,
    pub job_country: String,
    pub job_benefits: Option<String>,
    pub job_salary: Option<f64>,
    pub job_min_salary: Option<f64>,
    pub job_max_salary: Option<f64>,
    pub job_highlights: Option<String>,
    pub job_responsibilities: Option<String>,
    pub date_posted: Option<DateTime<Utc>>,
    pub job_hash: String,
    pub integrated_timestamp: DateTime<Utc>,
}

impl ProcessedJob {
    pub fn assemble(
        job: CleanedJob,
        enriched: EnrichedFields,
        job_hash: String,
        integrated_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            job_title: job.job_title,
            employer_name: job.employer_name,
            job_employment_type: job.job_employment_type,
            job_application_link: job.job_application_link,
            job_description: enriched.job_description,
            job_is_remote: job.job_is_remote,
            job_location: job.job_location,
            job_city: job.job_city,
            job_state: job.job_state,
            job_country: job.job_country,
            job_benefits: non_empty(enriched.job_benefits),
            job_salary: job.job_salary,
            job_min_salary: job.job_min_salary,
            job_max_salary: job.job_max_salary,
            job_highlights: non_empty(enriched.qualifications_needed),
            job_responsibilities: non_empty(enriched.job_responsibilities),
            date_posted: job.date_posted,
            job_hash,
            integrated_timestamp,
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
