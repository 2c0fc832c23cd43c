//! Bounded parse-and-repair of raw model responses.

use tracing::debug;

use super::extract::{extract_candidate, strip_trailing_commas};
use crate::schema::validate_model_output;
use crate::types::{ParseResult, StructuredOutput};

/// Default number of repair attempts after the initial parse.
pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 2;

/// Parse a raw response with the default repair budget.
pub fn parse_model_output(raw_text: &str) -> ParseResult {
    parse_model_output_with(raw_text, DEFAULT_MAX_REPAIR_ATTEMPTS)
}

/// Parse a raw response into a [`ParseResult`].
///
/// Total and deterministic: every input yields a result, never a panic.
///
/// Attempt 0 parses the extracted candidate as-is. Each later attempt
/// strips trailing commas first. `repair_attempts` records the index at
/// which parsing finally succeeded or gave up.
pub fn parse_model_output_with(raw_text: &str, max_repair_attempts: u32) -> ParseResult {
    let Some(candidate) = extract_candidate(raw_text) else {
        debug!("no JSON candidate found in model output");
        return ParseResult::no_json_found();
    };

    let mut text = candidate.text;
    let mut last_error = String::new();

    for attempt in 0..=max_repair_attempts {
        if attempt > 0 {
            text = strip_trailing_commas(&text);
        }

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => {
                debug!(attempt, source = ?candidate.source, "model output parsed");
                return check_shape(value, attempt);
            }
            Err(e) => {
                debug!(attempt, error = %e, "model output parse attempt failed");
                last_error = e.to_string();
            }
        }
    }

    ParseResult::syntax_error(max_repair_attempts, last_error)
}

/// Validate a syntactically parsed value against the output shape.
fn check_shape(value: serde_json::Value, attempt: u32) -> ParseResult {
    if let Err(errors) = validate_model_output(&value) {
        return ParseResult::shape_invalid(value, errors, attempt);
    }

    match serde_json::from_value::<StructuredOutput>(value.clone()) {
        Ok(output) => ParseResult::valid(value, output, attempt),
        Err(e) => ParseResult::shape_invalid(value, vec![e.to_string()], attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParseFailure, UncertaintyLevel};
    use proptest::prelude::*;

    const VALID: &str = r#"{"diagnosis": [], "medications": [{"name": "M", "dose": "1", "freq": "daily", "duration": "7d", "rationale": "R"}], "monitoring": [], "contraindications_flagged": [], "risk_flags": [], "icd10_codes": [], "uncertainty": {"level": "low", "reasons": []}}"#;

    const TRAILING_COMMAS: &str = r#"{"diagnosis": [], "medications": [{"name": "M", "dose": "1", "freq": "daily", "duration": "7d", "rationale": "R"},], "monitoring": [], "contraindications_flagged": [], "risk_flags": [], "icd10_codes": [], "uncertainty": {"level": "medium", "reasons": []},}"#;

    #[test]
    fn test_parse_valid_json() {
        let result = parse_model_output(VALID);
        assert!(result.valid_json);
        assert!(result.schema_valid);
        assert!(!result.repaired);
        assert_eq!(result.repair_attempts, 0);
        assert!(result.error.is_none());
        let output = result.usable_output().unwrap();
        assert_eq!(output.uncertainty.level, UncertaintyLevel::Low);
        assert_eq!(output.medications[0].name, "M");
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let result = parse_model_output_with(TRAILING_COMMAS, 2);
        assert!(result.valid_json);
        assert!(result.repaired);
        assert_eq!(result.repair_attempts, 1);
        assert!(result.schema_valid);
    }

    #[test]
    fn test_trailing_comma_without_budget_fails() {
        let result = parse_model_output_with(TRAILING_COMMAS, 0);
        assert!(!result.valid_json);
        assert!(result.parsed.is_none());
        assert!(!result.repaired);
        assert!(matches!(result.error, Some(ParseFailure::JsonSyntax(_))));
    }

    #[test]
    fn test_parse_no_json() {
        let result = parse_model_output("This is not JSON at all.");
        assert!(!result.valid_json);
        assert!(result.parsed.is_none());
        assert_eq!(result.error, Some(ParseFailure::NoJsonFound));
        assert_eq!(result.repair_attempts, 0);
    }

    #[test]
    fn test_empty_code_block_is_no_json() {
        let result = parse_model_output("Sorry:\n```json\n```");
        assert!(!result.valid_json);
        assert!(!result.repaired);
        assert_eq!(result.repair_attempts, 0);
        assert_eq!(result.error, Some(ParseFailure::NoJsonFound));
    }

    #[test]
    fn test_code_block_matches_unwrapped() {
        let fenced = format!("Some text\n```json\n{}\n```\n", VALID);
        let wrapped = parse_model_output(&fenced);
        let plain = parse_model_output(VALID);
        assert!(wrapped.valid_json);
        assert_eq!(wrapped.parsed, plain.parsed);
        assert_eq!(wrapped.output, plain.output);
    }

    #[test]
    fn test_prose_around_object() {
        let raw = format!("Sure! Here is the answer: {} Let me know.", VALID);
        let result = parse_model_output(&raw);
        assert!(result.schema_valid);
        assert_eq!(result.repair_attempts, 0);
    }

    #[test]
    fn test_unrecoverable_syntax_exhausts_budget() {
        let result = parse_model_output_with("{\"diagnosis\": [1 2]}", 2);
        assert!(!result.valid_json);
        assert!(result.parsed.is_none());
        assert!(result.repaired);
        assert_eq!(result.repair_attempts, 2);
        match result.error {
            Some(ParseFailure::JsonSyntax(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_invalid_keeps_object() {
        let result = parse_model_output(r#"{"diagnosis": ["x"]}"#);
        assert!(result.valid_json);
        assert!(!result.schema_valid);
        assert!(!result.repaired);
        assert_eq!(result.repair_attempts, 0);
        assert!(result.parsed.is_some());
        assert!(result.usable_output().is_none());
        assert!(matches!(result.error, Some(ParseFailure::SchemaViolation(_))));
    }

    #[test]
    fn test_bad_uncertainty_level_is_shape_invalid() {
        let raw = VALID.replace("\"low\"", "\"extreme\"");
        let result = parse_model_output(&raw);
        assert!(result.valid_json);
        assert!(!result.schema_valid);
    }

    #[test]
    fn test_bare_json_scalar_is_valid_json_wrong_shape() {
        let result = parse_model_output("42");
        assert!(result.valid_json);
        assert!(!result.schema_valid);
        assert_eq!(result.parsed, Some(serde_json::json!(42)));
    }

    proptest! {
        #[test]
        fn prop_parse_is_total_and_consistent(raw in ".{0,200}") {
            let result = parse_model_output(&raw);
            if result.parsed.is_some() {
                prop_assert!(result.valid_json);
            }
            if result.schema_valid {
                prop_assert!(result.valid_json);
                prop_assert!(result.output.is_some());
            }
            prop_assert_eq!(result.repaired, result.repair_attempts > 0);
        }

        #[test]
        fn prop_valid_object_needs_no_repair(flag in "[a-z_]{1,20}") {
            let flags = format!("\"risk_flags\": [\"{}\"]", flag);
            let raw = VALID.replace("\"risk_flags\": []", &flags);
            let result = parse_model_output(&raw);
            prop_assert!(result.valid_json);
            prop_assert!(!result.repaired);
            prop_assert_eq!(result.repair_attempts, 0);
        }
    }
}
