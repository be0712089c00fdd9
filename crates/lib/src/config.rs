//! # Pipeline Configuration
//!
//! `PipelineConfig` is assembled from three layers, later ones winning:
//!
//! 1. the defaults of each section;
//! 2. an optional YAML file (`jobflow.yml` unless a path is given) in which
//!    `${VAR}` placeholders are replaced with environment variables;
//! 3. `JOBFLOW_`-prefixed environment variables, with `__` separating nested
//!    keys (e.g. `JOBFLOW_ENRICHMENT__MAX_CONCURRENCY=10`).
//!
//! API keys left unset fall back to `OPENAI_API_KEY` and `RAPIDAPI_KEY`.

use crate::assemble::BatchAssembler;
use crate::constants::{
    DEFAULT_AI_API_URL, DEFAULT_ATTEMPTS, DEFAULT_CACHE_CAPACITY, DEFAULT_CHUNK_SIZE,
    DEFAULT_DB_FILE, DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_SEARCH_API_HOST,
    DEFAULT_SEARCH_API_URL, DEFAULT_SEARCH_TIMEOUT_SECS, DEFAULT_STORAGE_ROOT,
};
use crate::enrich::{Enricher, EnrichmentOptions, ResponseCache};
use crate::errors::ProviderError;
use crate::fetch::{FetchError, JobSearchClient, SearchParams, SearchSettings};
use crate::hash::IdentityPolicy;
use crate::pipeline::Pipeline;
use crate::processor::{JobProcessor, ParseFailurePolicy, ProcessorOptions};
use crate::providers::ai::{openai::OpenAiProvider, AiProvider, GenerationParams};
use crate::sink::{SinkError, SqliteJobSink};
use crate::storage::{LocalObjectStore, ObjectStore};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "jobflow.yml";

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(?P<var>[A-Za-z0-9_]+)\}").unwrap());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(#[from] config::ConfigError),
    #[error("Config file not found at '{0}'")]
    NotFound(String),
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that backs the object store.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_STORAGE_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file for the job sink, or ":memory:".
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_host: String,
    pub timeout_secs: u64,
    pub attempts: u32,
    pub params: SearchParams,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SEARCH_API_URL.to_string(),
            api_key: None,
            api_host: DEFAULT_SEARCH_API_HOST.to_string(),
            timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            attempts: DEFAULT_ATTEMPTS,
            params: SearchParams::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        let params = GenerationParams::default();
        Self {
            api_url: DEFAULT_AI_API_URL.to_string(),
            api_key: None,
            model: params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

impl AiConfig {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub max_concurrency: usize,
    pub attempts: u32,
    pub retry_backoff_ms: u64,
    pub cache_capacity: usize,
    pub on_parse_failure: ParseFailurePolicy,
    pub identity: IdentityPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            attempts: DEFAULT_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            on_parse_failure: ParseFailurePolicy::default(),
            identity: IdentityPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub chunk_size: usize,
    /// Move the raw input to `archive/` after every chunk was written.
    pub archive_input: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            archive_input: false,
        }
    }
}

/// The root configuration, mapping directly to `jobflow.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub ai: AiConfig,
    pub enrichment: EnrichmentConfig,
    pub output: OutputConfig,
}

// Reads a file and substitutes `${VAR}` placeholders from the environment.
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    Ok(Some(substitute_env(&content)))
}

/// Replaces every `${VAR}` with the value of `VAR`, or nothing if it is unset.
pub fn substitute_env(content: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &regex::Captures| {
            env::var(&caps["var"]).unwrap_or_default()
        })
        .into_owned()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PipelineConfig {
    /// Loads the layered configuration. An explicitly given file must exist;
    /// the default `jobflow.yml` is optional.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let file_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
        match read_and_substitute(file_path)? {
            Some(content) => {
                info!("Loading configuration from '{file_path}'.");
                builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
            }
            None if path.is_some() => return Err(ConfigError::NotFound(file_path.to_string())),
            None => info!("'{file_path}' not found; using defaults and environment."),
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("JOBFLOW")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: PipelineConfig = settings.try_deserialize()?;
        config.ai.api_key =
            non_blank(config.ai.api_key.take()).or_else(|| non_blank(env::var("OPENAI_API_KEY").ok()));
        config.source.api_key = non_blank(config.source.api_key.take())
            .or_else(|| non_blank(env::var("RAPIDAPI_KEY").ok()));
        config.validate()?;
        Ok(config)
    }

    /// Rejects sizes and counts that would stall the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("output.chunk_size", self.output.chunk_size as u64),
            ("enrichment.max_concurrency", self.enrichment.max_concurrency as u64),
            ("enrichment.attempts", u64::from(self.enrichment.attempts)),
            ("enrichment.cache_capacity", self.enrichment.cache_capacity as u64),
            ("source.attempts", u64::from(self.source.attempts)),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::Invalid(format!("{name} must be at least 1"))),
            None => Ok(()),
        }
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::new(LocalObjectStore::new(&self.storage.root))
    }

    pub fn ai_provider(&self) -> Result<Box<dyn AiProvider>, ProviderError> {
        if self.ai.api_key.is_none() && self.ai.api_url == DEFAULT_AI_API_URL {
            return Err(ProviderError::MissingApiKey);
        }
        Ok(Box::new(OpenAiProvider::new(
            self.ai.api_url.clone(),
            self.ai.api_key.clone(),
        )?))
    }

    pub fn enrichment_options(&self) -> EnrichmentOptions {
        EnrichmentOptions {
            attempts: self.enrichment.attempts,
            retry_backoff: Duration::from_millis(self.enrichment.retry_backoff_ms),
            params: self.ai.generation_params(),
            ..EnrichmentOptions::default()
        }
    }

    /// A processor with a fresh response cache around `provider`.
    pub fn processor(&self, provider: Box<dyn AiProvider>) -> JobProcessor {
        let cache = Arc::new(ResponseCache::new(self.enrichment.cache_capacity));
        let enricher = Enricher::new(provider, cache, self.enrichment_options());
        JobProcessor::new(
            enricher,
            ProcessorOptions {
                max_concurrency: self.enrichment.max_concurrency,
                identity: self.enrichment.identity,
                on_parse_failure: self.enrichment.on_parse_failure,
            },
        )
    }

    pub fn pipeline(&self, store: Arc<dyn ObjectStore>, provider: Box<dyn AiProvider>) -> Pipeline {
        Pipeline::new(
            store,
            self.processor(provider),
            BatchAssembler::new(self.output.chunk_size),
            self.output.archive_input,
        )
    }

    pub fn search_client(&self) -> Result<JobSearchClient, FetchError> {
        JobSearchClient::new(SearchSettings {
            api_url: self.source.api_url.clone(),
            api_key: self.source.api_key.clone(),
            api_host: self.source.api_host.clone(),
            timeout: Duration::from_secs(self.source.timeout_secs),
            attempts: self.source.attempts,
            ..SearchSettings::default()
        })
    }

    pub async fn job_sink(&self) -> Result<SqliteJobSink, SinkError> {
        SqliteJobSink::new(&self.database.path).await
    }
}
