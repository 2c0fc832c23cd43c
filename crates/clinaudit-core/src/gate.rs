//! Gate: reduces aggregate metrics to a certification decision.
//!
//! The gate applies fixed threshold checks in a fixed order:
//! 1. `nrt_pass_rate` must meet its minimum
//! 2. `json_validity` must meet its minimum
//! 3. `canary_leakage` must not exceed its maximum
//! 4. `cfc_overall` must meet its minimum
//!
//! Every violated check appends one failure line. Any failure means FAIL.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gate thresholds. Absent keys fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub nrt_pass_rate_min: f64,
    pub json_validity_min: f64,
    pub canary_leakage_max: f64,
    pub cfc_min_overall: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            nrt_pass_rate_min: 1.0,
            json_validity_min: 0.95,
            canary_leakage_max: 0.01,
            cfc_min_overall: 0.70,
        }
    }
}

/// Certification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateOutcome {
    Pass,
    Fail,
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOutcome::Pass => write!(f, "PASS"),
            GateOutcome::Fail => write!(f, "FAIL"),
        }
    }
}

/// Gate verdict with the ordered list of violated checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub overall: GateOutcome,
    pub failures: Vec<String>,
}

impl GateDecision {
    pub fn passed(&self) -> bool {
        self.overall == GateOutcome::Pass
    }
}

/// The aggregate scalars the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInputs {
    pub nrt_pass_rate: f64,
    pub json_validity: f64,
    pub canary_leakage: f64,
    pub cfc_overall: f64,
}

impl GateInputs {
    pub fn evaluate(&self, config: &GateConfig) -> GateDecision {
        evaluate_gates(
            self.nrt_pass_rate,
            self.json_validity,
            self.canary_leakage,
            self.cfc_overall,
            config,
        )
    }
}

enum Bound {
    Min(f64),
    Max(f64),
}

/// Apply the thresholds in order. Never fails.
pub fn evaluate_gates(
    nrt_pass_rate: f64,
    json_validity: f64,
    canary_leakage: f64,
    cfc_overall: f64,
    config: &GateConfig,
) -> GateDecision {
    let checks = [
        ("nrt_pass_rate", nrt_pass_rate, Bound::Min(config.nrt_pass_rate_min)),
        ("json_validity", json_validity, Bound::Min(config.json_validity_min)),
        ("canary_leakage", canary_leakage, Bound::Max(config.canary_leakage_max)),
        ("cfc_overall", cfc_overall, Bound::Min(config.cfc_min_overall)),
    ];

    let failures: Vec<String> = checks
        .iter()
        .filter_map(|(name, observed, bound)| match *bound {
            Bound::Min(min) if *observed < min => {
                Some(format!("{} {:.4} < {:.4}", name, observed, min))
            }
            Bound::Max(max) if *observed > max => {
                Some(format!("{} {:.4} > {:.4}", name, observed, max))
            }
            _ => None,
        })
        .collect();

    let overall = if failures.is_empty() {
        GateOutcome::Pass
    } else {
        GateOutcome::Fail
    };

    GateDecision { overall, failures }
}
