//! Response cache in front of any adapter.
//!
//! Keyed by `(prompt, model_id, version)`. Hits are served from memory
//! first, then from `<cache_dir>/<key>.json`, so a later run of the same
//! config against the same corpus never pays for the same call twice.
//!
//! Disk problems never fail a case: an unreadable entry is a miss and a
//! failed write is logged and dropped.

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AdapterError, GenerationResult, ModelAdapter};

/// Hex length of a cache key.
const CACHE_KEY_LEN: usize = 32;

/// Cache key for a prompt against one model version.
pub fn cache_key(prompt: &str, model_id: &str, version: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}|{}", prompt, model_id, version).as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(CACHE_KEY_LEN);
    key
}

/// On-disk form of one cached response.
#[derive(Debug, Serialize, Deserialize)]
struct StoredResponse {
    raw_text: String,
    model_id: String,
    version: String,
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    latency_seconds: f64,
}

impl From<&GenerationResult> for StoredResponse {
    fn from(result: &GenerationResult) -> Self {
        Self {
            raw_text: result.raw_text.clone(),
            model_id: result.model_id.clone(),
            version: result.version.clone(),
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            latency_seconds: result.latency_seconds,
        }
    }
}

impl From<StoredResponse> for GenerationResult {
    fn from(stored: StoredResponse) -> Self {
        Self {
            raw_text: stored.raw_text,
            model_id: stored.model_id,
            version: stored.version,
            prompt_tokens: stored.prompt_tokens,
            completion_tokens: stored.completion_tokens,
            latency_seconds: stored.latency_seconds,
            from_cache: true,
        }
    }
}

/// Adapter wrapper that memoizes responses.
pub struct CachedAdapter {
    inner: Arc<dyn ModelAdapter>,
    memory: Cache<String, GenerationResult>,
    dir: Option<PathBuf>,
    enabled: bool,
}

impl CachedAdapter {
    /// Memory-only cache; see [`with_dir`](Self::with_dir) to persist.
    pub fn new(inner: Arc<dyn ModelAdapter>, max_entries: u64, enabled: bool) -> Self {
        Self {
            inner,
            memory: Cache::builder().max_capacity(max_entries).build(),
            dir: None,
            enabled,
        }
    }

    /// Persist entries under `dir`, created on first write.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn entry_count(&self) -> u64 {
        self.memory.entry_count()
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{}.json", key)))
    }

    async fn load(&self, key: &str) -> Option<GenerationResult> {
        let path = self.entry_path(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry unreadable");
                return None;
            }
        };
        match serde_json::from_slice::<StoredResponse>(&bytes) {
            Ok(stored) => Some(stored.into()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry corrupt, ignoring");
                None
            }
        }
    }

    async fn store(&self, key: &str, result: &GenerationResult) {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.entry_path(key)) else {
            return;
        };
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            let json = serde_json::to_vec_pretty(&StoredResponse::from(result))?;
            tokio::fs::write(&path, json).await
        };
        if let Err(e) = written.await {
            warn!(path = %path.display(), error = %e, "failed to persist cache entry");
        }
    }
}

#[async_trait]
impl ModelAdapter for CachedAdapter {
    async fn generate(
        &self,
        prompt: &str,
        case_id: &str,
    ) -> Result<GenerationResult, AdapterError> {
        if !self.enabled {
            return self.inner.generate(prompt, case_id).await;
        }

        let key = cache_key(prompt, self.inner.model_id(), self.inner.version());
        if let Some(mut hit) = self.memory.get(&key).await {
            debug!(case_id, key = %key, "response cache hit");
            hit.from_cache = true;
            return Ok(hit);
        }
        if let Some(hit) = self.load(&key).await {
            debug!(case_id, key = %key, "response cache hit on disk");
            self.memory.insert(key, hit.clone()).await;
            return Ok(hit);
        }

        let result = self.inner.generate(prompt, case_id).await?;
        self.store(&key, &result).await;
        self.memory.insert(key, result.clone()).await;
        Ok(result)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn version(&self) -> &str {
        self.inner.version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;

    /// Same identity as the seeded mock, but every call fails.
    struct Offline;

    #[async_trait]
    impl ModelAdapter for Offline {
        async fn generate(
            &self,
            _prompt: &str,
            _case_id: &str,
        ) -> Result<GenerationResult, AdapterError> {
            Err(AdapterError::Unavailable("offline".to_string()))
        }

        fn model_id(&self) -> &str {
            "mock"
        }

        fn version(&self) -> &str {
            "v1"
        }
    }

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key("prompt", "mock", "v1");
        assert_eq!(key.len(), CACHE_KEY_LEN);
        assert_eq!(key, cache_key("prompt", "mock", "v1"));
        assert_ne!(key, cache_key("prompt", "mock", "v2"));
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let adapter = CachedAdapter::new(Arc::new(MockAdapter::new(42, "v1")), 100, true);

        let first = adapter.generate("same prompt", "c1").await.unwrap();
        assert!(!first.from_cache);

        let second = adapter.generate("same prompt", "c1").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(first.raw_text, second.raw_text);
        assert_eq!(adapter.model_id(), "mock");
    }

    #[tokio::test]
    async fn test_disabled_cache_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CachedAdapter::new(Arc::new(MockAdapter::new(42, "v1")), 100, false)
            .with_dir(dir.path().join("cache"));
        adapter.generate("p", "c1").await.unwrap();
        let again = adapter.generate("p", "c1").await.unwrap();
        assert!(!again.from_cache);
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_entries_survive_a_new_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");

        let first = CachedAdapter::new(Arc::new(MockAdapter::new(42, "v1")), 100, true)
            .with_dir(&cache_dir);
        let fresh = first.generate("persisted prompt", "c1").await.unwrap();
        assert!(!fresh.from_cache);

        let key = cache_key("persisted prompt", "mock", "v1");
        let bytes = std::fs::read(cache_dir.join(format!("{}.json", key))).unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored["model_id"], "mock");
        assert_eq!(stored["version"], "v1");
        assert_eq!(stored["raw_text"], fresh.raw_text.as_str());
        assert!(stored.get("from_cache").is_none());

        // The inner adapter is down, so this can only be answered from disk.
        let second = CachedAdapter::new(Arc::new(Offline), 100, true).with_dir(&cache_dir);
        let hit = second.generate("persisted prompt", "c1").await.unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.raw_text, fresh.raw_text);
        assert_eq!(second.entry_count(), 1);
        assert!(second.generate("other prompt", "c2").await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let key = cache_key("p", "mock", "v1");
        std::fs::write(dir.path().join(format!("{}.json", key)), "not json").unwrap();

        let adapter = CachedAdapter::new(Arc::new(MockAdapter::new(42, "v1")), 100, true)
            .with_dir(dir.path());
        let result = adapter.generate("p", "c1").await.unwrap();
        assert!(!result.from_cache);

        let rewritten = std::fs::read_to_string(dir.path().join(format!("{}.json", key))).unwrap();
        assert!(rewritten.contains("\"raw_text\""));
    }
}
