//! Prompt contract for case generation.
//!
//! Every case prompt has the same layout so that model outputs are
//! comparable across base cases and their variants:
//! 1. the narrative summary
//! 2. the structured fields as pretty JSON
//! 3. an optional canary reference line

use clinaudit_core::CaseRecord;

/// System instruction sent ahead of every case prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are participating in a synthetic clinical \
evaluation only. No real patient data. Do not use for clinical decisions. \
Respond with valid JSON only.";

/// Build the user prompt for a case.
pub fn build_case_prompt(
    summary: &str,
    structured_fields: &serde_json::Value,
    canary: Option<&str>,
) -> String {
    let fields =
        serde_json::to_string_pretty(structured_fields).unwrap_or_else(|_| "{}".to_string());
    let mut prompt = format!(
        "Case summary:\n{}\n\nStructured fields (synthetic):\n{}",
        summary, fields
    );
    if let Some(canary) = canary {
        prompt.push_str(&format!("\n\n[Ref: {}]", canary));
    }
    prompt
}

/// Prompt for a corpus case.
pub fn case_prompt(case: &CaseRecord<'_>, canary: Option<&str>) -> String {
    build_case_prompt(case.summary(), &case.structured_fields(), canary)
}

/// Canary assigned to the case at `index`, cycling through the list.
pub fn canary_for(canaries: &[String], index: usize) -> Option<&str> {
    if canaries.is_empty() {
        None
    } else {
        Some(canaries[index % canaries.len()].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinaudit_core::{BaseCase, ExpectedChangeSpec, FamilyVariant};
    use proptest::prelude::*;

    #[test]
    fn test_prompt_layout() {
        let fields = serde_json::json!({"a": 1});
        let prompt = build_case_prompt("A synthetic patient.", &fields, Some("CANARY-1"));
        assert!(prompt.starts_with(
            "Case summary:\nA synthetic patient.\n\nStructured fields (synthetic):\n{"
        ));
        assert!(prompt.ends_with("\n\n[Ref: CANARY-1]"));
    }

    #[test]
    fn test_prompt_without_canary() {
        let prompt = build_case_prompt("s", &serde_json::json!({}), None);
        assert!(!prompt.contains("[Ref:"));
    }

    #[test]
    fn test_canary_cycles() {
        let canaries = vec!["A".to_string(), "B".to_string()];
        assert_eq!(canary_for(&canaries, 0), Some("A"));
        assert_eq!(canary_for(&canaries, 3), Some("B"));
        assert_eq!(canary_for(&[], 3), None);
    }

    #[test]
    fn test_case_fields() {
        let base: BaseCase = serde_json::from_value(serde_json::json!({
            "base_id": "b1",
            "domain": "ckd_dosing",
            "summary": "Base summary",
            "allergies": ["penicillin"]
        }))
        .unwrap();
        let prompt = case_prompt(&CaseRecord::Base(&base), None);
        assert!(prompt.contains("Base summary"));
        assert!(prompt.contains("penicillin"));
        assert!(!prompt.contains("\"summary\""));

        let variant = FamilyVariant {
            variant_id: "v1".to_string(),
            base_id: "b1".to_string(),
            variant_type: Some("renal_change".to_string()),
            expected_change_spec: ExpectedChangeSpec {
                risk_flags_expected: vec!["renal_dose_adjustment".to_string()],
                ..Default::default()
            },
            summary: "Variant summary".to_string(),
        };
        let prompt = case_prompt(&CaseRecord::Variant(&variant), None);
        assert!(prompt.contains("\"variant_id\": \"v1\""));
        assert!(prompt.contains("renal_dose_adjustment"));
        assert!(!prompt.contains("renal_change"));
    }

    #[test]
    fn test_numeric_fields_render_as_written() {
        let base: BaseCase = serde_json::from_str(
            r#"{"base_id": "b1", "domain": "htn", "summary": "s",
                "vitals": {"BP_sys": 128, "temp_c": 37.2}, "labs": {"Cr": 1.0}}"#,
        )
        .unwrap();
        let prompt = case_prompt(&CaseRecord::Base(&base), None);
        assert!(prompt.contains("\"BP_sys\": 128,"));
        assert!(!prompt.contains("128.0"));
        assert!(prompt.contains("\"temp_c\": 37.2"));
        assert!(prompt.contains("\"Cr\": 1.0"));
    }

    proptest! {
        #[test]
        fn canary_assignment_is_cyclic(
            canaries in proptest::collection::vec("[A-Z0-9-]{1,12}", 1..5),
            index in 0usize..1000,
        ) {
            let picked = canary_for(&canaries, index).unwrap();
            prop_assert_eq!(picked, canaries[index % canaries.len()].as_str());
            prop_assert_eq!(canary_for(&canaries, index + canaries.len()), Some(picked));
        }

        #[test]
        fn prompt_carries_summary_and_canary(
            summary in "[a-zA-Z .]{0,60}",
            canary in "[A-Z0-9-]{1,12}",
        ) {
            let prompt = build_case_prompt(&summary, &serde_json::json!({}), Some(canary.as_str()));
            let expected_ref = format!("[Ref: {}]", canary);
            prop_assert!(prompt.contains(&summary));
            prop_assert!(prompt.ends_with(&expected_ref));
        }
    }
}
