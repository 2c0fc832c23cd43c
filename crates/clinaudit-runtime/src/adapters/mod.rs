//! Model adapters.
//!
//! A [`ModelAdapter`] is the single capability the runner needs: turn a
//! case prompt into raw text. Adapters are chosen once at startup through
//! the [`AdapterRegistry`] and composed by wrapping, e.g. a
//! [`CachedAdapter`] around a [`MockAdapter`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::ProviderError;

mod cached;
mod mock;
mod provider;
mod registry;

pub use cached::{cache_key, CachedAdapter};
pub use mock::MockAdapter;
pub use provider::ProviderAdapter;
pub use registry::{AdapterFactory, AdapterRegistry, MockAdapterFactory};

#[cfg(feature = "openai")]
pub use registry::OpenAiAdapterFactory;

/// Errors from model adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Adapter not available: {0}")]
    Unavailable(String),

    #[error("Generation failed for case {case_id}: {message}")]
    Generation { case_id: String, message: String },
}

/// Raw model output plus call metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub raw_text: String,
    pub model_id: String,
    pub version: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub latency_seconds: f64,
    pub from_cache: bool,
}

/// Anything that can answer a case prompt.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Generate a raw response. `case_id` is for logging and seeding only.
    async fn generate(&self, prompt: &str, case_id: &str) -> Result<GenerationResult, AdapterError>;

    fn model_id(&self) -> &str;

    fn version(&self) -> &str;
}
