//! # Identity Hasher
//!
//! Derives the content-addressed key used as the upsert conflict target.

use crate::types::RawJob;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// How a job's identity is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Use the source's `job_id` when present, otherwise the content hash.
    #[default]
    PreferSourceId,
    /// Always use the content hash.
    ContentHash,
}

/// SHA-256 over `title|employer|location|posted_at|link`.
///
/// Title, employer, location and link are trimmed and lower-cased; the
/// posted-at value is used verbatim. Absent fields contribute an empty string.
pub fn generate_job_hash(job: &RawJob) -> String {
    let normalized = |key: &str| job.text_or_empty(key).trim().to_lowercase();
    let hash_input = format!(
        "{}|{}|{}|{}|{}",
        normalized("job_title"),
        normalized("employer_name"),
        normalized("job_location"),
        job.text_or_empty("job_posted_at_datetime_utc"),
        normalized("job_apply_link"),
    );
    hex::encode(Sha256::digest(hash_input.as_bytes()))
}

/// Resolves the identity of a job under the given policy.
pub fn job_identity(job: &RawJob, policy: IdentityPolicy) -> String {
    match (policy, job.source_id()) {
        (IdentityPolicy::PreferSourceId, Some(id)) => id.to_string(),
        _ => generate_job_hash(job),
    }
}
