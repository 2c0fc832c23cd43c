//! YAML run configuration.
//!
//! Every key is optional. A minimal config is an empty document.
//!
//! ```yaml
//! seed: 42
//! data:
//!   data_dir: data
//!   output_dir: outputs
//! models:
//!   adapter: mock          # mock | openai
//!   mock_version: v1
//!   cache_enabled: true
//!   cache_dir: outputs/cache
//!   openai_model: gpt-4o-mini
//!   openai_api_key: sk-...   # else OPENAI_API_KEY, then API_KEY
//!   request_timeout: 30s
//! runtime:
//!   concurrency: 4
//!   max_repair_attempts: 2
//! gates:
//!   nrt_pass_rate_min: 1.0
//!   json_validity_min: 0.95
//!   canary_leakage_max: 0.01
//!   cfc_min_overall: 0.70
//! canaries:
//!   - CANARY-7f3a-0001
//! ```

use clinaudit_core::{config_hash, GateConfig, DEFAULT_MAX_REPAIR_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::ConfiguredSecret;

/// Subdirectory of the output dir that receives audit packets.
pub const AUDIT_PACKETS_DIR: &str = "audit_packets";

/// Errors that can occur when loading a run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to hash configuration: {0}")]
    Hash(#[from] serde_json::Error),
}

/// Corpus and output locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// Model adapter selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Registered adapter name.
    pub adapter: String,
    pub mock_version: String,
    pub cache_enabled: bool,

    /// In-memory entries kept in front of `cache_dir`.
    pub cache_capacity: u64,

    /// One `<key>.json` file per cached response, reused across runs.
    pub cache_dir: PathBuf,

    pub openai_model: String,
    pub openai_base_url: Option<String>,

    #[serde(skip_serializing)]
    pub openai_api_key: Option<ConfiguredSecret>,

    /// Per-request timeout, e.g. `30s` or `2m`.
    pub request_timeout: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            adapter: "mock".to_string(),
            mock_version: "v1".to_string(),
            cache_enabled: true,
            cache_capacity: 10_000,
            cache_dir: PathBuf::from("outputs").join("cache"),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: None,
            openai_api_key: None,
            request_timeout: "30s".to_string(),
        }
    }
}

impl ModelsConfig {
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.request_timeout).map_err(|e| {
            ConfigError::Invalid(format!(
                "models.request_timeout '{}': {}",
                self.request_timeout, e
            ))
        })
    }
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Maximum in-flight model calls.
    pub concurrency: usize,
    pub max_repair_attempts: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
        }
    }
}

/// Complete configuration of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    pub data: DataConfig,
    pub models: ModelsConfig,
    pub runtime: RuntimeSettings,
    pub gates: GateConfig,
    pub canaries: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            data: DataConfig::default(),
            models: ModelsConfig::default(),
            runtime: RuntimeSettings::default(),
            gates: GateConfig::default(),
            canaries: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let config: RunConfig = if yaml.trim().is_empty() {
            RunConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "runtime.concurrency must be at least 1".to_string(),
            ));
        }

        self.models.request_timeout()?;

        let thresholds = [
            ("gates.nrt_pass_rate_min", self.gates.nrt_pass_rate_min),
            ("gates.json_validity_min", self.gates.json_validity_min),
            ("gates.canary_leakage_max", self.gates.canary_leakage_max),
            ("gates.cfc_min_overall", self.gates.cfc_min_overall),
        ];
        for (key, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    key, value
                )));
            }
        }

        if self.canaries.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid("canaries must not be blank".to_string()));
        }

        Ok(())
    }

    /// Directory that receives audit packets.
    pub fn audit_dir(&self) -> PathBuf {
        self.data.output_dir.join(AUDIT_PACKETS_DIR)
    }

    /// Deterministic fingerprint of the effective configuration.
    pub fn hash(&self) -> Result<String, ConfigError> {
        Ok(config_hash(self)?)
    }
}
