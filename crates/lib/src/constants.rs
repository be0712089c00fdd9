//! # Shared Constants
//!
//! Object-store prefixes, sentinels and the defaults used when no
//! configuration overrides them.

/// Prefix under which the fetch stage writes raw search responses.
pub const RAW_DATA_PREFIX: &str = "raw_data/";

/// Prefix under which the process stage writes CSV chunks.
pub const PROCESSED_DATA_PREFIX: &str = "processed_data/";

/// Prefix that consumed artifacts are moved to.
pub const ARCHIVE_PREFIX: &str = "archive/";

/// Stored in place of an application link that failed validation.
pub const INVALID_URL: &str = "INVALID_URL";

/// Top-level field of an input artifact that holds the raw jobs.
pub const INPUT_DATA_FIELD: &str = "data";

/// Candidate date fields, tried in order.
pub const DATE_FIELDS: [&str; 2] = ["job_posted_at_datetime_utc", "date_posted"];

pub const DEFAULT_MAX_CONCURRENCY: usize = 50;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
pub const MAX_RETRY_BACKOFF_MS: u64 = 10_000;

pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

pub const DEFAULT_SEARCH_API_URL: &str = "https://jsearch.p.rapidapi.com/search";
pub const DEFAULT_SEARCH_API_HOST: &str = "jsearch.p.rapidapi.com";
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;

pub const DEFAULT_STORAGE_ROOT: &str = "data";
pub const DEFAULT_DB_FILE: &str = "db/jobflow.db";
