//! # Field Cleaner
//!
//! Turns an untrusted [`RawJob`] into a [`CleanedJob`]. Cleaning never fails:
//! malformed values degrade to `None` or to the [`INVALID_URL`] sentinel, and
//! the accompanying [`CleaningReport`] records which fields were degraded.

use crate::constants::{DATE_FIELDS, INVALID_URL};
use crate::types::{CleanedJob, RawJob};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

/// What happened to a single field during cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The value was present and parsed cleanly.
    Parsed,
    /// The value was missing or blank; the default was used.
    #[default]
    Absent,
    /// The value was present but malformed; it was replaced by null or a sentinel.
    Rejected,
}

/// Per-field outcomes for the fields that can degrade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub application_link: FieldOutcome,
    pub date_posted: FieldOutcome,
    pub job_salary: FieldOutcome,
    pub job_min_salary: FieldOutcome,
    pub job_max_salary: FieldOutcome,
}

impl CleaningReport {
    /// True when any field was present but had to be rejected.
    pub fn is_degraded(&self) -> bool {
        [
            self.application_link,
            self.date_posted,
            self.job_salary,
            self.job_min_salary,
            self.job_max_salary,
        ]
        .contains(&FieldOutcome::Rejected)
    }
}

/// Cleans a raw job, discarding the report.
pub fn clean(raw: RawJob) -> CleanedJob {
    clean_with_report(raw).0
}

/// Cleans a raw job and reports which fields were degraded.
pub fn clean_with_report(raw: RawJob) -> (CleanedJob, CleaningReport) {
    let mut report = CleaningReport::default();

    let raw_link = raw.text("job_apply_link");
    let job_application_link = match raw_link {
        Some(link) if validate_url(&link) => {
            report.application_link = FieldOutcome::Parsed;
            link
        }
        Some(link) => {
            if !link.trim().is_empty() {
                report.application_link = FieldOutcome::Rejected;
            }
            INVALID_URL.to_string()
        }
        None => INVALID_URL.to_string(),
    };

    let (date_posted, date_outcome) = parse_date_fields(&raw);
    report.date_posted = date_outcome;

    let (job_salary, outcome) = parse_salary_field(&raw, "job_salary");
    report.job_salary = outcome;
    let (job_min_salary, outcome) = parse_salary_field(&raw, "job_min_salary");
    report.job_min_salary = outcome;
    let (job_max_salary, outcome) = parse_salary_field(&raw, "job_max_salary");
    report.job_max_salary = outcome;

    let (job_highlights, responsibilities) = split_highlights(raw.get("job_highlights"));

    let job_is_remote = match raw.get("job_is_remote") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };

    let cleaned = CleanedJob {
        job_title: raw.text_or_empty("job_title"),
        employer_name: raw.text_or_empty("employer_name"),
        job_employment_type: raw.text_or_empty("job_employment_type"),
        job_application_link,
        job_is_remote,
        job_location: raw.text_or_empty("job_location"),
        job_city: raw.text_or_empty("job_city"),
        job_state: raw.text_or_empty("job_state"),
        job_country: raw.text_or_empty("job_country"),
        date_posted,
        job_salary,
        job_min_salary,
        job_max_salary,
        job_description: raw.text_or_empty("job_description"),
        job_highlights,
        responsibilities,
        job_benefits: raw.get("job_benefits").cloned().unwrap_or(Value::Null),
        source_id: raw.source_id().map(str::to_string),
    };

    (cleaned, report)
}

/// A link is usable only if it has both a scheme and a host.
pub fn validate_url(link: &str) -> bool {
    url::Url::parse(link)
        .map(|url| !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Parses a salary after dropping thousands separators and every character
/// that is not a digit or a decimal point.
pub fn clean_salary(salary: &str) -> Option<f64> {
    let cleaned: String = salary
        .replace(',', "")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn parse_salary_field(raw: &RawJob, field: &str) -> (Option<f64>, FieldOutcome) {
    match raw.text(field) {
        Some(text) if !text.trim().is_empty() => match clean_salary(&text) {
            Some(value) => (Some(value), FieldOutcome::Parsed),
            None => (None, FieldOutcome::Rejected),
        },
        _ => (None, FieldOutcome::Absent),
    }
}

/// Tries each candidate date field in order; the first one that parses wins.
fn parse_date_fields(raw: &RawJob) -> (Option<DateTime<Utc>>, FieldOutcome) {
    let mut outcome = FieldOutcome::Absent;
    for field in DATE_FIELDS {
        let Some(text) = raw.text(field).filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        match parse_date_fuzzy(&text) {
            Some(parsed) => return (Some(parsed), FieldOutcome::Parsed),
            None => {
                debug!(field, value = %text, "Failed to parse date field");
                outcome = FieldOutcome::Rejected;
            }
        }
    }
    (None, outcome)
}

const ZONED_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
];

static DATE_CANDIDATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    const MONTH: &str = "(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\\.?";
    [
        r"\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?"
            .to_string(),
        r"\d{1,2}/\d{1,2}/\d{4}(?: \d{1,2}:\d{2}(?::\d{2})?)?".to_string(),
        format!(r"(?i){MONTH}\s+\d{{1,2}},?\s+\d{{4}}"),
        format!(r"(?i)\d{{1,2}}\s+{MONTH},?\s+\d{{4}}"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static SEPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bsept\b").unwrap());

/// Parses a timestamp in any of the accepted shapes. If the whole string does
/// not parse, the leftmost embedded substring that does is used.
pub fn parse_date_fuzzy(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(parsed) = parse_date_exact(text) {
        return Some(parsed);
    }

    let mut candidates: Vec<_> = DATE_CANDIDATES
        .iter()
        .flat_map(|re| re.find_iter(text))
        .collect();
    candidates.sort_by_key(|m| (m.start(), std::cmp::Reverse(m.len())));
    candidates
        .into_iter()
        .find_map(|m| parse_date_exact(m.as_str()))
}

fn parse_date_exact(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }
    let without_dots = text.replace('.', "");
    let normalized = SEPT.replace_all(&without_dots, "Sep");
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Removes the responsibilities list from the highlights structure and returns both parts.
fn split_highlights(highlights: Option<&Value>) -> (Map<String, Value>, Vec<String>) {
    let mut remainder = match highlights {
        Some(Value::Object(map)) => map.clone(),
        _ => return (Map::new(), Vec::new()),
    };

    let key = remainder
        .keys()
        .find(|k| k.eq_ignore_ascii_case("responsibilities"))
        .cloned();
    let responsibilities = match key.and_then(|k| remainder.remove(&k)) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        _ => Vec::new(),
    };

    (remainder, responsibilities)
}
