//! Format Compliance

use serde::{Deserialize, Serialize};

/// Format compliance tallies over one batch.
///
/// `schema_violations` is `total - valid_count`, so pure syntax failures
/// and shape failures share one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FcResult {
    pub valid_count: usize,
    pub repaired_count: usize,
    pub total: usize,
    pub schema_violations: usize,
}

impl FcResult {
    pub fn validity_rate(&self) -> f64 {
        ratio(self.valid_count, self.total)
    }

    pub fn repair_rate(&self) -> f64 {
        ratio(self.repaired_count, self.total)
    }
}

fn ratio(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64
    }
}

/// Tally `(valid_json, repaired)` pairs, one per attempted case.
///
/// Repair is counted independently of validity.
pub fn fc_aggregate<I>(attempts: I) -> FcResult
where
    I: IntoIterator<Item = (bool, bool)>,
{
    let mut result = FcResult::default();
    for (valid_json, repaired) in attempts {
        result.total += 1;
        if valid_json {
            result.valid_count += 1;
        }
        if repaired {
            result.repaired_count += 1;
        }
    }
    result.schema_violations = result.total - result.valid_count;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch() {
        let result = fc_aggregate(Vec::new());
        assert_eq!(result.total, 0);
        assert_eq!(result.validity_rate(), 0.0);
        assert_eq!(result.repair_rate(), 0.0);
        assert_eq!(result.schema_violations, 0);
    }

    #[test]
    fn test_repair_independent_of_validity() {
        let result = fc_aggregate(vec![(true, false), (true, true), (false, true), (false, false)]);
        assert_eq!(result.valid_count, 2);
        assert_eq!(result.repaired_count, 2);
        assert_eq!(result.schema_violations, 2);
        assert_eq!(result.validity_rate(), 0.5);
        assert_eq!(result.repair_rate(), 0.5);
    }
}
