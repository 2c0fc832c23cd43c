//! OpenAI-compatible chat-completions provider.
//!
//! Works against any endpoint implementing `POST {base_url}/chat/completions`,
//! including local inference servers.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ApiKey, ChatCompletion, ChatRequest, LlmProvider, ProviderError, TokenUsage};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Generic variable consulted when `OPENAI_API_KEY` is unset.
pub const FALLBACK_API_KEY_ENV: &str = "API_KEY";

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    key: ApiKey,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(
        key: ApiKey,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base = base_url.unwrap_or(OPENAI_DEFAULT_BASE_URL).trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ProviderError::InvalidEndpoint(format!(
                "base url '{}' is not http(s)",
                base
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            key,
            endpoint: format!("{}/chat/completions", base),
            client,
        })
    }

    /// Key from config, `OPENAI_API_KEY` or `API_KEY`, endpoint from config
    /// or the public API.
    pub fn from_config(
        api_key: Option<&str>,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let key = ApiKey::resolve(api_key, &[OPENAI_API_KEY_ENV, FALLBACK_API_KEY_ENV])?;
        Self::new(key, base_url, timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl WireResponse {
    fn into_completion(self) -> Result<ChatCompletion, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices".to_string()))?;

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            usage: self.usage,
            model: self.model,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.key.expose())
            .timeout(request.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(request.timeout)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), model = %request.model, "chat completion returned");

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited {
                    retry_after: retry_after(response.headers()),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Unauthorized)
            }
            s if !s.is_success() => {
                let message = response
                    .json::<WireError>()
                    .await
                    .map(|b| b.error.message)
                    .unwrap_or_else(|_| s.canonical_reason().unwrap_or("unknown").to_string());
                return Err(ProviderError::Status {
                    status: s.as_u16(),
                    message,
                });
            }
            _ => {}
        }

        response
            .json::<WireResponse>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?
            .into_completion()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::KeyOrigin;

    fn key() -> ApiKey {
        ApiKey::new("test-key", KeyOrigin::Config)
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let timeout = Duration::from_secs(5);
        let p = OpenAiProvider::new(key(), Some("http://localhost:8000/v1/"), timeout).unwrap();
        assert_eq!(p.endpoint(), "http://localhost:8000/v1/chat/completions");

        let p = OpenAiProvider::new(key(), None, Duration::from_secs(5)).unwrap();
        assert_eq!(p.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err =
            OpenAiProvider::new(key(), Some("ftp://nope"), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_wire_response_conversion() {
        let body: WireResponse = serde_json::from_str(
            r#"{"model": "gpt-4o-mini",
                "choices": [{"message": {"content": "{}"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2}}"#,
        )
        .unwrap();
        let completion = body.into_completion().unwrap();
        assert_eq!(completion.content, "{}");
        assert_eq!(completion.usage.completion_tokens, 2);
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let body: WireResponse = serde_json::from_str(r#"{"model": "m", "choices": []}"#).unwrap();
        assert!(matches!(
            body.into_completion(),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
