//! Deterministic mock adapter.
//!
//! Produces a plausible, schema-valid response seeded by
//! `(seed, case_id, version)`. Different versions of the mock stand in for a
//! baseline and a candidate model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{AdapterError, GenerationResult, ModelAdapter};
use clinaudit_core::{StructuredOutput, UncertaintyLevel};
use clinaudit_core::types::{Medication, Uncertainty};

/// Model id reported by the mock.
pub const MOCK_MODEL_ID: &str = "mock";

/// Seconds reported as call latency.
const MOCK_LATENCY_SECONDS: f64 = 0.01;

/// Deterministic stand-in for a real model.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    seed: u64,
    version: String,
    risk_flags: Vec<String>,
}

impl MockAdapter {
    pub fn new(seed: u64, version: impl Into<String>) -> Self {
        Self {
            seed,
            version: version.into(),
            risk_flags: vec![
                "safety_review_recommended".to_string(),
                "synthetic_case".to_string(),
            ],
        }
    }

    /// Report exactly these risk flags for every case.
    pub fn with_risk_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.risk_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    fn level_for(&self, case_id: &str) -> UncertaintyLevel {
        let seed_text = format!("{}_{}_{}", self.seed, case_id, self.version);
        let digest = Sha256::digest(seed_text.as_bytes());
        let pick = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        match pick % 3 {
            0 => UncertaintyLevel::Low,
            1 => UncertaintyLevel::Medium,
            _ => UncertaintyLevel::High,
        }
    }

    /// The structured response the mock gives for `case_id`.
    pub fn plausible_output(&self, case_id: &str) -> StructuredOutput {
        let level = self.level_for(case_id);
        let mut reasons = vec!["Synthetic evaluation response.".to_string()];
        if level != UncertaintyLevel::Low {
            reasons.push("Insufficient information in case.".to_string());
        }

        StructuredOutput {
            diagnosis: vec!["Synthetic diagnosis for evaluation only.".to_string()],
            medications: vec![Medication {
                name: "synthetic_med".to_string(),
                dose: "as per protocol".to_string(),
                freq: "daily".to_string(),
                duration: "evaluation only".to_string(),
                rationale: "Synthetic response.".to_string(),
            }],
            monitoring: vec!["Routine monitoring per synthetic protocol.".to_string()],
            contraindications_flagged: vec!["None in synthetic case.".to_string()],
            risk_flags: self.risk_flags.clone(),
            icd10_codes: vec!["Z00.00".to_string()],
            uncertainty: Uncertainty { level, reasons },
        }
    }
}

#[async_trait]
impl ModelAdapter for MockAdapter {
    async fn generate(
        &self,
        prompt: &str,
        case_id: &str,
    ) -> Result<GenerationResult, AdapterError> {
        let raw_text = serde_json::to_string_pretty(&self.plausible_output(case_id)).map_err(|e| {
            AdapterError::Generation {
                case_id: case_id.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(GenerationResult {
            prompt_tokens: (prompt.len() / 4) as u32,
            completion_tokens: (raw_text.len() / 4) as u32,
            raw_text,
            model_id: MOCK_MODEL_ID.to_string(),
            version: self.version.clone(),
            latency_seconds: MOCK_LATENCY_SECONDS,
            from_cache: false,
        })
    }

    fn model_id(&self) -> &str {
        MOCK_MODEL_ID
    }

    fn version(&self) -> &str {
        &self.version
    }
}
