use thiserror::Error;

/// Errors raised while talking to a text-generation provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error (status {status}): {body}")]
    AiApi { status: u16, body: String },
    #[error("AI provider returned no choices")]
    EmptyResponse,
    #[error("API key is missing")]
    MissingApiKey,
}

/// The text-generation service answered, but not with the expected JSON object.
#[derive(Error, Debug)]
pub enum ResponseParseError {
    #[error("Failed to parse API response as valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Expected a JSON object at the top level, found {0}")]
    NotAnObject(&'static str),
}

/// Run-scoped failures of the process and load stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input artifact '{key}': {reason}")]
    InvalidInput { key: String, reason: String },
    #[error("Object storage error: {0}")]
    Store(#[from] crate::storage::StoreError),
    #[error("Sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}
