//! Run context and the audit record of a completed run.
//!
//! Run metadata travels as an explicit value next to the decision; nothing
//! here reads or writes global state except [`EnvInfo::capture`] and
//! [`git_commit_hash`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, info};

use crate::cases::CaseCorpus;
use crate::evidence::{worst_failures, NrtFailure};
use crate::gate::{GateConfig, GateDecision};
use crate::pipeline::{MetricsReport, OutputIndex};
use crate::types::ParseResult;

/// Length of the hex config fingerprint.
const CONFIG_HASH_LEN: usize = 16;

/// Characters of the commit id kept in run metadata.
const GIT_COMMIT_LEN: usize = 16;

/// Recorded when the working directory is not a git checkout.
pub const UNKNOWN_GIT_COMMIT: &str = "unknown";

/// Deterministic fingerprint of any serializable configuration.
///
/// Hashes the canonical JSON form (object keys sorted), so key order in
/// the source file does not matter.
pub fn config_hash<T: Serialize>(config: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_value(config)?.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(CONFIG_HASH_LEN);
    Ok(hex)
}

/// Host environment captured at run start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvInfo {
    pub os: String,
    pub arch: String,
    pub crate_version: String,
}

impl EnvInfo {
    pub fn capture() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Abbreviated `HEAD` commit of the working directory, or
/// [`UNKNOWN_GIT_COMMIT`] if git is missing or this is not a checkout.
pub fn git_commit_hash() -> String {
    let output = match Command::new("git").args(["rev-parse", "HEAD"]).output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!(status = %output.status, "git rev-parse failed");
            return UNKNOWN_GIT_COMMIT.to_string();
        }
        Err(e) => {
            debug!(error = %e, "git not available");
            return UNKNOWN_GIT_COMMIT.to_string();
        }
    };

    let commit: String = String::from_utf8_lossy(&output.stdout)
        .trim()
        .chars()
        .take(GIT_COMMIT_LEN)
        .collect();
    if commit.is_empty() {
        UNKNOWN_GIT_COMMIT.to_string()
    } else {
        commit
    }
}

/// Identity and provenance of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunContext {
    /// `<model_id>_<version>`.
    pub run_id: String,
    pub model_id: String,
    pub model_version: String,
    pub config_hash: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub env: EnvInfo,
    pub command_line: String,

    #[serde(default = "unknown_git_commit")]
    pub git_commit_hash: String,
}

fn unknown_git_commit() -> String {
    UNKNOWN_GIT_COMMIT.to_string()
}

impl RunContext {
    pub fn new(
        model_id: impl Into<String>,
        model_version: impl Into<String>,
        config_hash: impl Into<String>,
        seed: u64,
    ) -> Self {
        let model_id = model_id.into();
        let model_version = model_version.into();
        Self {
            run_id: format!("{}_{}", model_id, model_version),
            model_id,
            model_version,
            config_hash: config_hash.into(),
            seed,
            started_at: Utc::now(),
            env: EnvInfo::capture(),
            command_line: String::new(),
            git_commit_hash: git_commit_hash(),
        }
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    pub fn with_git_commit(mut self, commit: impl Into<String>) -> Self {
        self.git_commit_hash = commit.into();
        self
    }
}

/// Model-call accounting for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageSummary {
    pub calls: u64,
    pub failed_calls: u64,
    pub cache_hits: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub latency_seconds: f64,
}

/// The complete audit record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub context: RunContext,
    pub metrics: MetricsReport,
    pub gate: GateDecision,
    pub parse_results: BTreeMap<String, ParseResult>,
    pub worst_failures: Vec<NrtFailure>,
    pub usage: UsageSummary,
}

impl RunReport {
    /// Aggregate a finished run and apply the gate.
    pub fn build(
        context: RunContext,
        corpus: &CaseCorpus,
        index: &OutputIndex,
        gates: &GateConfig,
        canaries: &[String],
        usage: UsageSummary,
    ) -> Self {
        let (metrics, gate) = crate::certify(corpus, index, gates);

        info!(
            run_id = %context.run_id,
            verdict = %gate.overall,
            failures = gate.failures.len(),
            "gate evaluated"
        );

        Self {
            worst_failures: worst_failures(corpus, index, canaries),
            parse_results: index.parse_results(),
            context,
            metrics,
            gate,
            usage,
        }
    }

    /// File name of the audit packet for this run.
    pub fn packet_file_name(&self) -> String {
        format!("audit_packet_{}.json", self.context.run_id)
    }
}
