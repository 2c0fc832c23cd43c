//! # clinaudit-runtime
//!
//! Model-calling half of clinaudit.
//!
//! `clinaudit-core` scores responses and never talks to a model. This crate
//! produces those responses: it loads the run configuration, resolves a
//! model adapter, fans case prompts out to it, and feeds the parsed results
//! back into the core engine.
//!
//! ## Adapters
//!
//! - `mock`: deterministic, seeded, always available
//! - `openai`: any OpenAI-compatible chat endpoint (feature `openai`)
//!
//! Every adapter is wrapped in a response cache persisted under
//! `models.cache_dir`. An unknown or misconfigured adapter falls back to the
//! mock with a warning.
//!
//! ## Example
//!
//! ```rust,ignore
//! use clinaudit_core::CaseCorpus;
//! use clinaudit_runtime::{RunConfig, Runner};
//!
//! let config = RunConfig::from_yaml_file("configs/default.yaml")?;
//! let corpus = CaseCorpus::from_dir(&config.data.data_dir)?;
//! let runner = Runner::from_config(config)?;
//!
//! let report = runner.run(&corpus).await?;
//! println!("{}", report.gate.overall);
//! ```

pub mod adapters;
pub mod config;
pub mod prompts;
pub mod providers;
pub mod runner;
pub mod usage;

pub use adapters::{
    AdapterError, AdapterRegistry, CachedAdapter, GenerationResult, MockAdapter, ModelAdapter,
};
pub use config::{ConfigError, RunConfig};
pub use runner::{write_audit_packet, RunError, Runner};
pub use usage::UsageTracker;
