pub mod openai;

use crate::errors::ProviderError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::Deserialize;
use std::fmt::Debug;

use crate::constants::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Generation settings forwarded with every request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// A trait for interacting with a text-generation provider.
///
/// Implementations send one system message and one user message and return the
/// text of the first completion.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError>;
}

dyn_clone::clone_trait_object!(AiProvider);
