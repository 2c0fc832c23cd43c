//! Aggregation pipeline: wires case identity to metric inputs.
//!
//! The pipeline never fails on partial data. A case that produced no
//! usable output still participates as a failing data point.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::cases::{CaseCorpus, SuiteEntry};
use crate::gate::GateInputs;
use crate::metrics::{
    cfc_aggregate, fc_aggregate, sng_evaluate, CfcResult, FamilyPair, FcResult, NrtInput,
    PcResult, SngResult,
};
use crate::types::{ParseResult, StructuredOutput};

/// Flag required by a non-regression entry that lists none of its own.
pub const DEFAULT_NRT_FLAG: &str = "safety_review_recommended";

lazy_static! {
    static ref DEFAULT_NRT_FLAGS: Vec<String> = vec![DEFAULT_NRT_FLAG.to_string()];
}

/// Required risk flags for a suite entry, with the default applied.
pub fn required_flags(entry: &SuiteEntry) -> &[String] {
    if entry.expected_risk_flags.is_empty() {
        &DEFAULT_NRT_FLAGS
    } else {
        &entry.expected_risk_flags
    }
}

/// Everything recorded for one attempted case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub raw_text: String,
    pub parse: ParseResult,

    /// Canary markers injected into this case's prompt.
    pub canaries: Vec<String>,
}

/// Case id to best-effort outcome.
#[derive(Debug, Clone, Default)]
pub struct OutputIndex {
    outcomes: BTreeMap<String, CaseOutcome>,
}

impl OutputIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, case_id: impl Into<String>, outcome: CaseOutcome) {
        self.outcomes.insert(case_id.into(), outcome);
    }

    pub fn get(&self, case_id: &str) -> Option<&CaseOutcome> {
        self.outcomes.get(case_id)
    }

    /// Usable structured output for a case, if it was attempted and parsed.
    pub fn output(&self, case_id: &str) -> Option<&StructuredOutput> {
        self.outcomes.get(case_id).and_then(|o| o.parse.usable_output())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CaseOutcome)> {
        self.outcomes.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Parse results keyed by case id, for the report.
    pub fn parse_results(&self) -> BTreeMap<String, ParseResult> {
        self.outcomes
            .iter()
            .map(|(id, o)| (id.clone(), o.parse.clone()))
            .collect()
    }
}

impl FromIterator<(String, CaseOutcome)> for OutputIndex {
    fn from_iter<T: IntoIterator<Item = (String, CaseOutcome)>>(iter: T) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl Extend<(String, CaseOutcome)> for OutputIndex {
    fn extend<T: IntoIterator<Item = (String, CaseOutcome)>>(&mut self, iter: T) {
        self.outcomes.extend(iter);
    }
}

/// Resolve every family variant against its base and its own output.
pub fn family_pairs<'a>(corpus: &'a CaseCorpus, index: &'a OutputIndex) -> Vec<FamilyPair<'a>> {
    corpus
        .variants
        .iter()
        .map(|v| FamilyPair {
            variant_id: &v.variant_id,
            base_id: &v.base_id,
            spec: &v.expected_change_spec,
            base_output: index.output(&v.base_id),
            variant_output: index.output(&v.variant_id),
        })
        .collect()
}

/// Resolve every non-regression entry against its target's output.
pub fn nrt_inputs<'a>(corpus: &'a CaseCorpus, index: &'a OutputIndex) -> Vec<NrtInput<'a>> {
    corpus
        .nrt_suite()
        .iter()
        .map(|entry| {
            if index.get(&entry.target_id).is_none() {
                warn!(
                    case_id = %entry.case_id,
                    target = %entry.target_id,
                    "no output recorded for NRT target"
                );
            }
            NrtInput {
                case_id: &entry.case_id,
                expected_risk_flags: required_flags(entry),
                output: index.output(&entry.target_id),
            }
        })
        .collect()
}

/// `(valid_json, repaired)` for every attempted case.
pub fn fc_inputs(index: &OutputIndex) -> impl Iterator<Item = (bool, bool)> + '_ {
    index
        .iter()
        .map(|(_, o)| (o.parse.valid_json, o.parse.repaired))
}

/// `(raw_text, canaries)` for every attempted case.
pub fn pc_inputs(index: &OutputIndex) -> Vec<(&str, &[String])> {
    index
        .iter()
        .map(|(_, o)| (o.raw_text.as_str(), o.canaries.as_slice()))
        .collect()
}

/// Format compliance with its derived rates spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcSummary {
    #[serde(flatten)]
    pub counts: FcResult,
    pub validity_rate: f64,
    pub repair_rate: f64,
}

impl From<FcResult> for FcSummary {
    fn from(counts: FcResult) -> Self {
        Self {
            validity_rate: counts.validity_rate(),
            repair_rate: counts.repair_rate(),
            counts,
        }
    }
}

/// All four metric aggregates for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub cfc: CfcResult,
    pub sng: SngResult,
    pub fc: FcSummary,
    pub pc: PcResult,
}

impl MetricsReport {
    /// The scalars the gate compares against its thresholds.
    pub fn gate_inputs(&self) -> GateInputs {
        GateInputs {
            nrt_pass_rate: self.sng.pass_rate,
            json_validity: self.fc.validity_rate,
            canary_leakage: self.pc.leakage_rate,
            cfc_overall: self.cfc.overall,
        }
    }
}

/// Compute every metric over a completed run.
pub fn aggregate(corpus: &CaseCorpus, index: &OutputIndex) -> MetricsReport {
    let domains = corpus.domain_index();

    let pairs = family_pairs(corpus, index);
    let cfc = cfc_aggregate(&pairs, &domains);

    let nrt = nrt_inputs(corpus, index);
    let sng = sng_evaluate(&nrt);

    let fc = FcSummary::from(fc_aggregate(fc_inputs(index)));
    let pc = PcResult::from_cases(&pc_inputs(index));

    debug!(
        cfc_overall = cfc.overall,
        nrt_pass_rate = sng.pass_rate,
        json_validity = fc.validity_rate,
        canary_leakage = pc.leakage_rate,
        "metrics aggregated"
    );

    MetricsReport { cfc, sng, fc, pc }
}
