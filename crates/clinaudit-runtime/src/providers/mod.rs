//! Chat-completion providers.
//!
//! A provider speaks one vendor's wire protocol and nothing else: it takes a
//! fully built [`ChatRequest`] and returns the first completion. Retries,
//! caching and prompt layout live above it, in
//! [`ProviderAdapter`](crate::adapters::ProviderAdapter).
//!
//! Credentials go through [`secrets::ApiKey`] and never reach logs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::prompts::SYSTEM_INSTRUCTION;

pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

pub use secrets::{ApiKey, ConfiguredSecret, KeyOrigin};

#[cfg(feature = "openai")]
pub use openai::{
    OpenAiProvider, FALLBACK_API_KEY_ENV, OPENAI_API_KEY_ENV, OPENAI_DEFAULT_BASE_URL,
};

/// Errors from a provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Credential rejected by provider")]
    Unauthorized,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Per-run generation settings shared by every case request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// One chat-completion request, serialized as-is onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,

    #[serde(skip)]
    pub timeout: Duration,
}

impl ChatRequest {
    /// The evaluation instruction followed by one case prompt.
    pub fn for_case(settings: &ChatSettings, prompt: &str) -> Self {
        Self {
            model: settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: SYSTEM_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.to_string(),
                },
            ],
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: settings.timeout,
        }
    }
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The first completion choice of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: TokenUsage,

    /// Model that actually served the request
    pub model: String,

    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError>;

    /// Provider name, used as the adapter's model id.
    fn name(&self) -> &str;
}
