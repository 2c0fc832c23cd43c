//! # clinaudit-core
//!
//! Deterministic scoring and certification engine for language-model
//! responses to synthetic clinical-style scenarios.
//!
//! This crate answers one question for a model version: is it safe to
//! certify? It does so in three steps:
//! - parse each raw response into a validated structured record
//! - score the batch with four independent metrics (CFC, SNG, FC, PC)
//! - reduce the scores to PASS/FAIL with named reasons
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same responses always produce the same decision
//! 2. **No model calls**: Generation lives in `clinaudit-runtime`
//! 3. **Total**: No single bad response can abort a batch
//! 4. **Traceable**: Every FAIL lists each violated threshold in a fixed order
//!
//! ## Example
//!
//! ```rust,ignore
//! use clinaudit_core::{
//!     certify, parse_model_output, CaseCorpus, CaseOutcome, GateConfig, OutputIndex,
//! };
//!
//! let corpus = CaseCorpus::from_dir("data")?;
//! let mut index = OutputIndex::new();
//! for case in corpus.cases() {
//!     let raw = generate(case.summary());
//!     index.insert(case.id(), CaseOutcome {
//!         parse: parse_model_output(&raw),
//!         raw_text: raw,
//!         canaries: vec![],
//!     });
//! }
//!
//! let (metrics, decision) = certify(&corpus, &index, &GateConfig::default());
//! println!("{}: {:?}", decision.overall, decision.failures);
//! ```

pub mod cases;
pub mod evidence;
pub mod gate;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod run;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use cases::{
    BaseCase, CaseCorpus, CaseRecord, CorpusError, ExpectedChangeSpec, FamilyVariant, SuiteEntry,
};
pub use evidence::NrtFailure;
pub use gate::{evaluate_gates, GateConfig, GateDecision, GateInputs, GateOutcome};
pub use metrics::{
    cfc_aggregate, cfc_score_single, fc_aggregate, pc_check_leak, pc_leakage_rate,
    sng_check_case, sng_pass_rate, CfcResult, FcResult, PcResult, SngResult,
};
pub use output::{parse_model_output, parse_model_output_with, DEFAULT_MAX_REPAIR_ATTEMPTS};
pub use pipeline::{aggregate, CaseOutcome, MetricsReport, OutputIndex};
pub use run::{
    config_hash, git_commit_hash, EnvInfo, RunContext, RunReport, UsageSummary,
    UNKNOWN_GIT_COMMIT,
};
pub use schema::SchemaError;
pub use types::{ParseFailure, ParseResult, StructuredOutput, UncertaintyLevel};

/// Score a completed batch and apply the gate.
///
/// This is the main entry point once every case outcome has been collected.
pub fn certify(
    corpus: &CaseCorpus,
    index: &OutputIndex,
    gates: &GateConfig,
) -> (MetricsReport, GateDecision) {
    let metrics = aggregate(corpus, index);
    let decision = metrics.gate_inputs().evaluate(gates);
    (metrics, decision)
}
