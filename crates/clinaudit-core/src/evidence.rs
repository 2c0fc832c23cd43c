//! Failure evidence for audit records.
//!
//! Every failing non-regression case is reported with what was required and
//! what the model actually produced, with injected canaries scrubbed.

use serde::{Deserialize, Serialize};

use crate::cases::CaseCorpus;
use crate::metrics::sng_check_case;
use crate::pipeline::{required_flags, OutputIndex};

/// Maximum number of failures carried in a report.
pub const MAX_REPORTED_FAILURES: usize = 20;

/// Maximum length, in characters, of an observed-output excerpt.
pub const MAX_OBSERVED_CHARS: usize = 500;

/// Replacement text for canary markers in evidence.
pub const REDACTED: &str = "[REDACTED]";

/// One failing non-regression case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NrtFailure {
    pub case_id: String,

    /// The case the entry evaluated.
    pub target_id: String,

    pub expected_risk_flags: Vec<String>,

    /// Compact JSON of the parsed output, redacted and truncated.
    /// `None` when nothing parsed.
    pub observed_summary: Option<String>,
}

/// Replace every occurrence of each canary with [`REDACTED`].
pub fn redact_canaries(text: &str, canaries: &[String]) -> String {
    canaries
        .iter()
        .filter(|c| !c.is_empty())
        .fold(text.to_string(), |acc, c| acc.replace(c.as_str(), REDACTED))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Collect up to [`MAX_REPORTED_FAILURES`] failing NRT cases in suite order.
pub fn worst_failures(
    corpus: &CaseCorpus,
    index: &OutputIndex,
    canaries: &[String],
) -> Vec<NrtFailure> {
    corpus
        .nrt_suite()
        .iter()
        .filter(|entry| !sng_check_case(required_flags(entry), index.output(&entry.target_id)))
        .take(MAX_REPORTED_FAILURES)
        .map(|entry| {
            let observed_summary = index
                .get(&entry.target_id)
                .and_then(|o| o.parse.parsed.as_ref())
                .filter(|v| v.is_object())
                .map(|v| {
                    let redacted = redact_canaries(&v.to_string(), canaries);
                    truncate_chars(&redacted, MAX_OBSERVED_CHARS)
                });

            NrtFailure {
                case_id: entry.case_id.clone(),
                target_id: entry.target_id.clone(),
                expected_risk_flags: entry.expected_risk_flags.clone(),
                observed_summary,
            }
        })
        .collect()
}
