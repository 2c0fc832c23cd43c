//! Adapter factory registry.
//!
//! Adapters register factories under a name. The run configuration names
//! one; the registry builds it once at startup and wraps it in the response
//! cache under `models.cache_dir`. An unknown or unavailable adapter falls
//! back to the mock.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = AdapterRegistry::with_defaults();
//! let adapter = registry.resolve(&config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{AdapterError, CachedAdapter, MockAdapter, ModelAdapter};
use crate::config::{ConfigError, RunConfig};

/// Factory for building an adapter from the run configuration.
pub trait AdapterFactory: Send + Sync {
    /// Name used in `models.adapter`.
    fn name(&self) -> &'static str;

    fn create(&self, config: &RunConfig) -> Result<Arc<dyn ModelAdapter>, AdapterError>;

    fn description(&self) -> &'static str {
        "Model adapter"
    }
}

/// Builds the deterministic [`MockAdapter`].
pub struct MockAdapterFactory;

impl AdapterFactory for MockAdapterFactory {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create(&self, config: &RunConfig) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
        Ok(Arc::new(MockAdapter::new(
            config.seed,
            config.models.mock_version.clone(),
        )))
    }

    fn description(&self) -> &'static str {
        "Deterministic seeded mock"
    }
}

/// Builds a [`ProviderAdapter`](super::ProviderAdapter) over
/// [`OpenAiProvider`](crate::providers::OpenAiProvider).
#[cfg(feature = "openai")]
pub struct OpenAiAdapterFactory;

#[cfg(feature = "openai")]
impl AdapterFactory for OpenAiAdapterFactory {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &RunConfig) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
        use crate::providers::{ChatSettings, OpenAiProvider};

        let timeout = config
            .models
            .request_timeout()
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        let provider = OpenAiProvider::from_config(
            config.models.openai_api_key.as_ref().map(|k| k.expose()),
            config.models.openai_base_url.as_deref(),
            timeout,
        )?;
        let settings = ChatSettings {
            model: config.models.openai_model.clone(),
            timeout,
            ..Default::default()
        };
        Ok(Arc::new(super::ProviderAdapter::new(Arc::new(provider), settings)))
    }

    fn description(&self) -> &'static str {
        "OpenAI-compatible chat completions"
    }
}

/// Registry of available adapter factories.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MockAdapterFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(OpenAiAdapterFactory));
        registry
    }

    /// Register a factory, replacing any with the same name.
    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        self.factories.insert(factory.name().to_string(), factory);
    }

    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_adapter(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build exactly the named adapter, without fallback or caching.
    pub fn create(
        &self,
        name: &str,
        config: &RunConfig,
    ) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
        self.factories
            .get(name)
            .ok_or_else(|| {
                AdapterError::Unavailable(format!(
                    "Unknown adapter: '{}'. Available: {:?}",
                    name,
                    self.available()
                ))
            })?
            .create(config)
    }

    /// Build the configured adapter, falling back to the mock, and wrap it
    /// in the response cache.
    pub fn resolve(&self, config: &RunConfig) -> Result<Arc<dyn ModelAdapter>, ConfigError> {
        let requested = config.models.adapter.as_str();

        let inner = match self.create(requested, config) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(adapter = requested, error = %e, "adapter unavailable, using mock");
                MockAdapterFactory
                    .create(config)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?
            }
        };

        info!(
            model_id = inner.model_id(),
            version = inner.version(),
            cache = config.models.cache_enabled,
            cache_dir = %config.models.cache_dir.display(),
            "model adapter resolved"
        );

        let cached = CachedAdapter::new(
            inner,
            config.models.cache_capacity,
            config.models.cache_enabled,
        )
        .with_dir(&config.models.cache_dir);
        Ok(Arc::new(cached))
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_mock() {
        let registry = AdapterRegistry::with_defaults();
        assert!(registry.has_adapter("mock"));
    }

    #[test]
    fn test_unknown_adapter_errors_on_create() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry
            .create("does-not-exist", &RunConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_resolve_falls_back_to_mock() {
        let mut config = RunConfig::default();
        config.models.adapter = "does-not-exist".to_string();
        config.models.mock_version = "v2".to_string();

        let adapter = AdapterRegistry::with_defaults().resolve(&config).unwrap();
        assert_eq!(adapter.model_id(), "mock");
        assert_eq!(adapter.version(), "v2");
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_openai_factory_uses_configured_key() {
        let config = RunConfig::from_yaml(
            "models:\n  adapter: openai\n  openai_api_key: sk-test\n  openai_model: gpt-test\n",
        )
        .unwrap();
        let adapter = OpenAiAdapterFactory.create(&config).unwrap();
        assert_eq!(adapter.model_id(), "openai");
        assert_eq!(adapter.version(), "gpt-test");
    }

    #[test]
    fn test_register_custom_factory() {
        struct Flagged;
        impl AdapterFactory for Flagged {
            fn name(&self) -> &'static str {
                "flagged"
            }
            fn create(&self, config: &RunConfig) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
                Ok(Arc::new(MockAdapter::new(config.seed, "flagged").with_risk_flags(["X"])))
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Flagged));
        assert_eq!(registry.available(), vec!["flagged"]);

        let mut config = RunConfig::default();
        config.models.adapter = "flagged".to_string();
        let adapter = registry.resolve(&config).unwrap();
        assert_eq!(adapter.version(), "flagged");
    }
}
