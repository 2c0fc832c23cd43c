//! Model-call accounting for a run.

use clinaudit_core::UsageSummary;
use parking_lot::Mutex;

use crate::adapters::GenerationResult;

/// Thread-safe accumulator of call counts, tokens and latency.
#[derive(Debug, Default)]
pub struct UsageTracker {
    summary: Mutex<UsageSummary>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call.
    ///
    /// Cache hits count as calls but add no tokens or latency.
    pub fn record(&self, result: &GenerationResult) {
        let mut summary = self.summary.lock();
        summary.calls += 1;
        if result.from_cache {
            summary.cache_hits += 1;
            return;
        }
        summary.prompt_tokens += u64::from(result.prompt_tokens);
        summary.completion_tokens += u64::from(result.completion_tokens);
        summary.latency_seconds += result.latency_seconds;
    }

    /// Record a call that returned an error.
    pub fn record_failure(&self) {
        let mut summary = self.summary.lock();
        summary.calls += 1;
        summary.failed_calls += 1;
    }

    pub fn snapshot(&self) -> UsageSummary {
        *self.summary.lock()
    }
}
