//! # Job Postings ETL
//!
//! This crate fetches job postings from a search API, normalizes and enriches
//! them with an AI text-generation provider, writes the results as CSV chunks
//! to an object store and upserts those chunks into a SQLite table.
//!
//! The stages are independent: [`fetch::fetch_to_store`] writes a raw batch,
//! [`pipeline::Pipeline::run`] processes the newest raw batch, and
//! [`load::load_pending`] loads every processed chunk still waiting.

pub mod assemble;
pub mod clean;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod errors;
pub mod fetch;
pub mod hash;
pub mod load;
pub mod pipeline;
pub mod processor;
pub mod prompts;
pub mod providers;
pub mod sink;
pub mod storage;
pub mod types;

pub use assemble::{BatchAssembler, ChunkReport};
pub use clean::{clean, clean_with_report, CleaningReport, FieldOutcome};
pub use config::{ConfigError, PipelineConfig};
pub use enrich::{Enricher, Enrichment, EnrichmentOptions, EnrichmentStatus, ResponseCache};
pub use errors::{PipelineError, ProviderError, ResponseParseError};
pub use fetch::{fetch_to_store, FetchError, JobSearchClient};
pub use hash::{generate_job_hash, job_identity, IdentityPolicy};
pub use load::{load_latest, load_pending, LoadOutcome, LoadReport};
pub use pipeline::{Pipeline, RunOutcome, RunReport};
pub use processor::{JobProcessor, ParseFailurePolicy, ProcessorOptions};
pub use sink::{JobSink, SinkError, SqliteJobSink};
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore, StoreError};
pub use types::{CleanedJob, EnrichedFields, ProcessedJob, RawJob};
