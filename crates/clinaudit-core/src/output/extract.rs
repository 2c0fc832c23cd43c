//! Candidate extraction and textual normalization for raw model responses.
//!
//! Models wrap JSON in prose, markdown fences, or leave trailing commas.
//! These helpers locate the most likely JSON text and apply the one
//! normalization the repair loop is allowed to make.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// First fenced code block, optionally tagged `json`.
    static ref FENCED_BLOCK: Regex = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap();

    /// Greedy span from the first `{` to the last `}`.
    static ref BRACE_SPAN: Regex = Regex::new(r"\{[\s\S]*\}").unwrap();

    /// A comma followed only by whitespace before a closing bracket.
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
}

/// Where the candidate text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    WholeText,
    FencedBlock,
    BraceSpan,
}

/// Candidate JSON text located in a raw response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub source: CandidateSource,
}

/// Locate candidate JSON text. First success wins:
///
/// 1. the whole (trimmed) text, if it parses strictly
/// 2. the content of the first fenced code block
/// 3. the greedy `{ ... }` span
///
/// A fenced block with a blank body ends the search with no candidate.
pub fn extract_candidate(raw: &str) -> Option<Candidate> {
    let text = raw.trim();

    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        return Some(Candidate {
            text: text.to_string(),
            source: CandidateSource::WholeText,
        });
    }

    if let Some(caps) = FENCED_BLOCK.captures(text) {
        let body = caps.get(1).map_or("", |m| m.as_str().trim());
        if body.is_empty() {
            return None;
        }
        return Some(Candidate {
            text: body.to_string(),
            source: CandidateSource::FencedBlock,
        });
    }

    BRACE_SPAN.find(text).map(|m| Candidate {
        text: m.as_str().to_string(),
        source: CandidateSource::BraceSpan,
    })
}

/// Remove commas that sit immediately before a closing `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}
