//! Async evaluation runner.
//!
//! Drives one model adapter over every case in a corpus, parses each
//! response, and hands the collected outcomes to the core engine for
//! scoring and certification.
//!
//! # Execution Flow
//! 1. Build one prompt per case, cycling canaries by case position
//! 2. Fan out up to `runtime.concurrency` adapter calls
//! 3. Parse each response (a failed call becomes an empty response)
//! 4. Aggregate metrics and apply the gate
//! 5. Optionally write the audit packet

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use clinaudit_core::{
    parse_model_output_with, CaseCorpus, CaseOutcome, CaseRecord, CorpusError, OutputIndex,
    RunContext, RunReport,
};

use crate::adapters::{AdapterRegistry, ModelAdapter};
use crate::config::{ConfigError, RunConfig};
use crate::prompts::{canary_for, case_prompt};
use crate::usage::UsageTracker;

/// Errors that abort a run.
///
/// Individual model or parse failures never appear here; they are recorded
/// per case and scored.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Runs a corpus through one model adapter.
pub struct Runner {
    adapter: Arc<dyn ModelAdapter>,
    config: RunConfig,
}

impl Runner {
    pub fn new(adapter: Arc<dyn ModelAdapter>, config: RunConfig) -> Self {
        Self { adapter, config }
    }

    /// Resolve the configured adapter through the default registry.
    pub fn from_config(config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        let adapter = AdapterRegistry::with_defaults().resolve(&config)?;
        Ok(Self::new(adapter, config))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn ModelAdapter> {
        &self.adapter
    }

    /// Generate and parse a response for every case.
    ///
    /// Results are collected in case order regardless of concurrency.
    pub async fn generate_all(&self, corpus: &CaseCorpus, usage: &UsageTracker) -> OutputIndex {
        let concurrency = self.config.runtime.concurrency.max(1);
        let cases: Vec<CaseRecord<'_>> = corpus.cases().collect();
        info!(
            cases = cases.len(),
            concurrency,
            model_id = self.adapter.model_id(),
            version = self.adapter.version(),
            "generating responses"
        );

        stream::iter(cases.into_iter().enumerate())
            .map(|(position, case)| self.evaluate_case(position, case, usage))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn evaluate_case(
        &self,
        position: usize,
        case: CaseRecord<'_>,
        usage: &UsageTracker,
    ) -> (String, CaseOutcome) {
        let case_id = case.id();
        let canary = canary_for(&self.config.canaries, position);
        let prompt = case_prompt(&case, canary);

        let raw_text = match self.adapter.generate(&prompt, case_id).await {
            Ok(result) => {
                usage.record(&result);
                result.raw_text
            }
            Err(e) => {
                usage.record_failure();
                warn!(case_id, error = %e, "generation failed, scoring empty response");
                String::new()
            }
        };

        let parse = parse_model_output_with(&raw_text, self.config.runtime.max_repair_attempts);
        debug!(
            case_id,
            schema_valid = parse.schema_valid,
            repaired = parse.repaired,
            "response parsed"
        );

        let outcome = CaseOutcome {
            raw_text,
            parse,
            canaries: canary.map(str::to_string).into_iter().collect(),
        };
        (case_id.to_string(), outcome)
    }

    /// Run the whole corpus and certify the result.
    pub async fn run(&self, corpus: &CaseCorpus) -> Result<RunReport, RunError> {
        let context = RunContext::new(
            self.adapter.model_id(),
            self.adapter.version(),
            self.config.hash()?,
            self.config.seed,
        );
        self.run_with_context(corpus, context).await
    }

    /// Run with a caller-supplied context, e.g. one carrying the command line.
    pub async fn run_with_context(
        &self,
        corpus: &CaseCorpus,
        context: RunContext,
    ) -> Result<RunReport, RunError> {
        info!(run_id = %context.run_id, config_hash = %context.config_hash, "run started");

        let usage = UsageTracker::new();
        let index = self.generate_all(corpus, &usage).await;

        Ok(RunReport::build(
            context,
            corpus,
            &index,
            &self.config.gates,
            &self.config.canaries,
            usage.snapshot(),
        ))
    }
}

/// Write the audit packet for a report into `dir`, creating it if needed.
pub fn write_audit_packet(report: &RunReport, dir: &Path) -> Result<PathBuf, RunError> {
    std::fs::create_dir_all(dir).map_err(|source| RunError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(report.packet_file_name());
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "audit packet written");
    Ok(path)
}
