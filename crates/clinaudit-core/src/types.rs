//! Core record types shared across the engine.
//!
//! Everything here is plain data: created once per evaluation run,
//! immutable after construction, and serializable for the report layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model's self-reported confidence band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyLevel {
    Low,
    Medium,
    High,
}

impl UncertaintyLevel {
    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            UncertaintyLevel::Low => "low",
            UncertaintyLevel::Medium => "medium",
            UncertaintyLevel::High => "high",
        }
    }
}

/// Uncertainty block of a model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Uncertainty {
    pub level: UncertaintyLevel,
    pub reasons: Vec<String>,
}

/// A single medication recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub name: String,
    pub dose: String,
    pub freq: String,
    pub duration: String,
    pub rationale: String,
}

/// The structured response a model must produce for a case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredOutput {
    pub diagnosis: Vec<String>,
    pub medications: Vec<Medication>,
    pub monitoring: Vec<String>,
    pub contraindications_flagged: Vec<String>,
    pub risk_flags: Vec<String>,
    pub icd10_codes: Vec<String>,
    pub uncertainty: Uncertainty,
}

impl StructuredOutput {
    /// Medication names in response order.
    pub fn medication_names(&self) -> impl Iterator<Item = &str> {
        self.medications.iter().map(|m| m.name.as_str())
    }
}

/// Why a raw response did not yield a usable structured output.
///
/// `NoJsonFound` and `JsonSyntax` are terminal: nothing was recovered.
/// `SchemaViolation` keeps the parsed value but marks it unusable for
/// the safety and consistency metrics.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseFailure {
    #[error("no_json_found")]
    NoJsonFound,

    #[error("{0}")]
    JsonSyntax(String),

    #[error("schema violation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
}

/// Outcome of parsing and repairing one raw model response.
///
/// # Invariants
///
/// - `parsed.is_some()` only if `valid_json`
/// - `schema_valid` implies `valid_json`
/// - `output.is_some()` iff `schema_valid`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseResult {
    /// Recovered JSON value, kept even when it fails the shape check.
    pub parsed: Option<serde_json::Value>,

    /// Typed view of `parsed`, present only for shape-valid responses.
    #[serde(skip)]
    pub output: Option<StructuredOutput>,

    pub valid_json: bool,
    pub repaired: bool,

    /// Attempt index at which parsing finally succeeded or failed.
    pub repair_attempts: u32,

    pub schema_valid: bool,
    pub error: Option<ParseFailure>,
}

impl ParseResult {
    /// No candidate JSON text could be located.
    pub fn no_json_found() -> Self {
        Self {
            parsed: None,
            output: None,
            valid_json: false,
            repaired: false,
            repair_attempts: 0,
            schema_valid: false,
            error: Some(ParseFailure::NoJsonFound),
        }
    }

    /// Every repair attempt failed to produce parseable JSON.
    pub fn syntax_error(attempt: u32, message: impl Into<String>) -> Self {
        Self {
            parsed: None,
            output: None,
            valid_json: false,
            repaired: attempt > 0,
            repair_attempts: attempt,
            schema_valid: false,
            error: Some(ParseFailure::JsonSyntax(message.into())),
        }
    }

    /// JSON parsed and matched the output shape.
    pub fn valid(value: serde_json::Value, output: StructuredOutput, attempt: u32) -> Self {
        Self {
            parsed: Some(value),
            output: Some(output),
            valid_json: true,
            repaired: attempt > 0,
            repair_attempts: attempt,
            schema_valid: true,
            error: None,
        }
    }

    /// JSON parsed but does not match the output shape.
    pub fn shape_invalid(value: serde_json::Value, errors: Vec<String>, attempt: u32) -> Self {
        Self {
            parsed: Some(value),
            output: None,
            valid_json: true,
            repaired: attempt > 0,
            repair_attempts: attempt,
            schema_valid: false,
            error: Some(ParseFailure::SchemaViolation(errors)),
        }
    }

    /// Structured output usable by the safety and consistency metrics.
    pub fn usable_output(&self) -> Option<&StructuredOutput> {
        if self.schema_valid {
            self.output.as_ref()
        } else {
            None
        }
    }

    /// Human-readable error string, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}
