//! Bridge from a chat-completion provider to a model adapter.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::{AdapterError, GenerationResult, ModelAdapter};
use crate::providers::{ChatRequest, ChatSettings, LlmProvider, ProviderError};

/// Attempts after the first call for transient provider failures.
const MAX_RETRIES: usize = 3;

/// Serves case prompts through an [`LlmProvider`].
///
/// The adapter's model id is the provider name and its version is the
/// configured model, so cache keys and run ids change when the model does.
pub struct ProviderAdapter {
    provider: Arc<dyn LlmProvider>,
    settings: ChatSettings,
    min_backoff: Duration,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ChatSettings) -> Self {
        Self {
            provider,
            settings,
            min_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_min_backoff(mut self, delay: Duration) -> Self {
        self.min_backoff = delay;
        self
    }
}

#[async_trait]
impl ModelAdapter for ProviderAdapter {
    async fn generate(
        &self,
        prompt: &str,
        case_id: &str,
    ) -> Result<GenerationResult, AdapterError> {
        let request = ChatRequest::for_case(&self.settings, prompt);
        let started = Instant::now();

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_times(MAX_RETRIES);

        let (provider, request) = (&self.provider, &request);
        let completion = (|| async move { provider.complete(request).await })
            .retry(backoff)
            .when(ProviderError::is_retryable)
            .notify(|err: &ProviderError, delay: Duration| {
                warn!(case_id, error = %err, ?delay, "provider call failed, retrying");
            })
            .await?;

        Ok(GenerationResult {
            raw_text: completion.content,
            model_id: self.provider.name().to_string(),
            version: self.settings.model.clone(),
            prompt_tokens: completion.usage.prompt_tokens,
            completion_tokens: completion.usage.completion_tokens,
            latency_seconds: started.elapsed().as_secs_f64(),
            from_cache: false,
        })
    }

    fn model_id(&self) -> &str {
        self.provider.name()
    }

    fn version(&self) -> &str {
        &self.settings.model
    }
}
