//! Batch limit policy.

use serde::{Deserialize, Serialize};

/// Packing thresholds for summarization requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    /// Hard ceiling on estimated input tokens per request.
    pub max_tokens_per_request: usize,
    pub max_batch_size: usize,
    /// Tokens consumed by the prompt scaffolding of every request.
    pub base_prompt_tokens: usize,
    pub avg_tokens_per_summary: usize,
    pub json_overhead_tokens: usize,
    pub provider_max_output_tokens: usize,
    /// Fraction of the provider output ceiling that may be used (0, 1].
    pub output_safety_margin: f64,
    /// Headroom kept free when truncating an oversized item.
    pub truncation_buffer_tokens: usize,
    pub tokens_per_char: f64,
    /// When set, the builder also flushes before the expected response would
    /// exceed the output ceiling.
    pub enforce_output_limit: bool,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_tokens_per_request: 100_000,
            max_batch_size: 20,
            base_prompt_tokens: 500,
            avg_tokens_per_summary: 300,
            json_overhead_tokens: 200,
            provider_max_output_tokens: 8_192,
            output_safety_margin: 0.9,
            truncation_buffer_tokens: 1_000,
            tokens_per_char: 0.25,
            enforce_output_limit: false,
        }
    }
}

impl BatchLimits {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_tokens_per_request(mut self, t: usize) -> Self {
        self.max_tokens_per_request = t;
        self
    }
    pub fn with_max_batch_size(mut self, s: usize) -> Self {
        self.max_batch_size = s;
        self
    }
    pub fn with_base_prompt_tokens(mut self, t: usize) -> Self {
        self.base_prompt_tokens = t;
        self
    }
    pub fn with_truncation_buffer_tokens(mut self, t: usize) -> Self {
        self.truncation_buffer_tokens = t;
        self
    }
    pub fn with_tokens_per_char(mut self, r: f64) -> Self {
        self.tokens_per_char = r;
        self
    }
    pub fn with_enforce_output_limit(mut self, e: bool) -> Self {
        self.enforce_output_limit = e;
        self
    }
}

/// Stateless predicates over [`BatchLimits`].
///
/// Input size and expected output size are independent constraints: providers
/// cap both, and a batch of many short items can blow the output ceiling while
/// staying far below the input one.
#[derive(Debug, Clone)]
pub struct BatchLimitPolicy {
    limits: BatchLimits,
}

impl BatchLimitPolicy {
    pub fn new(limits: BatchLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn exceeds_input_limit(&self, current: usize, additional: usize) -> bool {
        current.saturating_add(additional) > self.limits.max_tokens_per_request
    }

    /// Absolute ceiling for a single item.
    pub fn exceeds_max_tokens(&self, tokens: usize) -> bool {
        tokens > self.limits.max_tokens_per_request
    }

    pub fn exceeds_batch_size(&self, size: usize) -> bool {
        size >= self.limits.max_batch_size
    }

    pub fn estimate_output_tokens(&self, batch_size: usize) -> usize {
        batch_size
            .saturating_mul(self.limits.avg_tokens_per_summary)
            .saturating_add(self.limits.json_overhead_tokens)
    }

    pub fn max_output_tokens_allowed(&self) -> usize {
        (self.limits.provider_max_output_tokens as f64 * self.limits.output_safety_margin) as usize
    }

    pub fn exceeds_output_limit(&self, batch_size: usize) -> bool {
        self.estimate_output_tokens(batch_size) > self.max_output_tokens_allowed()
    }

    /// Token budget for a forcibly truncated item.
    pub fn max_tokens_for_truncation(&self) -> usize {
        self.limits
            .max_tokens_per_request
            .saturating_sub(self.limits.truncation_buffer_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BatchLimitPolicy {
        BatchLimitPolicy::new(BatchLimits {
            max_tokens_per_request: 100,
            max_batch_size: 3,
            avg_tokens_per_summary: 50,
            json_overhead_tokens: 10,
            provider_max_output_tokens: 200,
            output_safety_margin: 0.9,
            truncation_buffer_tokens: 20,
            ..BatchLimits::default()
        })
    }

    #[test]
    fn test_input_limit_is_strict() {
        let p = policy();
        assert!(!p.exceeds_input_limit(50, 50));
        assert!(p.exceeds_input_limit(50, 51));
        assert!(!p.exceeds_max_tokens(100));
        assert!(p.exceeds_max_tokens(101));
    }

    #[test]
    fn test_batch_size_is_inclusive() {
        let p = policy();
        assert!(!p.exceeds_batch_size(2));
        assert!(p.exceeds_batch_size(3));
    }

    #[test]
    fn test_output_estimate() {
        let p = policy();
        assert_eq!(p.estimate_output_tokens(3), 160);
        assert_eq!(p.max_output_tokens_allowed(), 180);
        assert!(!p.exceeds_output_limit(3));
        assert!(p.exceeds_output_limit(4));
    }

    #[test]
    fn test_truncation_budget_saturates() {
        assert_eq!(policy().max_tokens_for_truncation(), 80);
        let tiny = BatchLimitPolicy::new(
            BatchLimits::new()
                .with_max_tokens_per_request(10)
                .with_truncation_buffer_tokens(50),
        );
        assert_eq!(tiny.max_tokens_for_truncation(), 0);
    }
}
