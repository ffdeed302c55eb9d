//! Dynamic batch builder.

use super::policy::{BatchLimitPolicy, BatchLimits};
use super::truncator::ItemTruncator;
use super::types::Batch;
use crate::tokens::{CharacterEstimator, TokenCounter};
use crate::types::Item;
use std::sync::Arc;
use tracing::{debug, warn};

/// Items collected for the batch currently being packed.
struct Accumulator {
    items: Vec<Item>,
    running_tokens: usize,
    base_tokens: usize,
}

impl Accumulator {
    fn new(base_tokens: usize) -> Self {
        Self {
            items: Vec::new(),
            running_tokens: base_tokens,
            base_tokens,
        }
    }

    fn push(&mut self, item: Item, tokens: usize) {
        self.running_tokens += tokens;
        self.items.push(item);
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Emit the current contents as a batch and reset. Empty accumulators emit nothing.
    fn flush_into(&mut self, out: &mut Vec<Batch>) {
        if self.items.is_empty() {
            return;
        }
        let batch = Batch {
            items: std::mem::take(&mut self.items),
            estimated_tokens: self.running_tokens,
            truncated: false,
        };
        debug!(
            batch_index = out.len(),
            items = batch.items.len(),
            estimated_tokens = batch.estimated_tokens,
            "batch flushed"
        );
        out.push(batch);
        self.running_tokens = self.base_tokens;
    }
}

/// Packs an ordered item sequence into token-bounded batches.
///
/// The pass is deterministic and preserves order: concatenating the items of
/// the produced batches yields the input sequence.
pub struct DynamicBatchBuilder {
    policy: BatchLimitPolicy,
    truncator: ItemTruncator,
    counter: Arc<dyn TokenCounter>,
}

impl DynamicBatchBuilder {
    pub fn new(limits: BatchLimits) -> Self {
        let counter = Arc::new(CharacterEstimator::from_tokens_per_char(limits.tokens_per_char));
        Self::with_counter(limits, counter)
    }

    pub fn with_counter(limits: BatchLimits, counter: Arc<dyn TokenCounter>) -> Self {
        let truncator = ItemTruncator::new(limits.tokens_per_char);
        Self {
            policy: BatchLimitPolicy::new(limits),
            truncator,
            counter,
        }
    }

    pub fn policy(&self) -> &BatchLimitPolicy {
        &self.policy
    }

    pub fn build(&self, items: Vec<Item>) -> Vec<Batch> {
        let base = self.policy.limits().base_prompt_tokens;
        let enforce_output = self.policy.limits().enforce_output_limit;
        let mut batches = Vec::new();
        let mut acc = Accumulator::new(base);

        for mut item in items {
            let tokens = self.counter.count_item(&item);
            item.token_estimate = Some(tokens);

            // An item that cannot fit even an empty request goes out alone, truncated.
            if self.policy.exceeds_max_tokens(base.saturating_add(tokens)) {
                acc.flush_into(&mut batches);
                batches.push(self.truncated_batch(item, tokens));
                continue;
            }

            let must_flush = self.policy.exceeds_input_limit(acc.running_tokens, tokens)
                || self.policy.exceeds_batch_size(acc.len())
                || (enforce_output && self.policy.exceeds_output_limit(acc.len() + 1));
            if must_flush && !acc.is_empty() {
                acc.flush_into(&mut batches);
            }

            acc.push(item, tokens);
        }
        acc.flush_into(&mut batches);

        debug!(batches = batches.len(), "packing complete");
        batches
    }

    fn truncated_batch(&self, item: Item, tokens: usize) -> Batch {
        // only the body is cut, so the title's cost comes off the budget
        let title_tokens = self.counter.count(&item.title);
        let budget = self
            .policy
            .max_tokens_for_truncation()
            .saturating_sub(title_tokens);
        let id = item.id;
        let mut item = self.truncator.truncate(item, budget);
        let truncated_tokens = self.counter.count_item(&item);
        item.token_estimate = Some(truncated_tokens);
        warn!(
            item_id = id,
            original_tokens = tokens,
            truncated_tokens,
            budget,
            "oversized item truncated into its own batch"
        );
        Batch {
            items: vec![item],
            estimated_tokens: self.policy.limits().base_prompt_tokens + truncated_tokens,
            truncated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::truncator::TRUNCATION_MARKER;
    use chrono::{TimeZone, Utc};

    /// One token per character, no title cost.
    struct CharCounter;
    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn item(id: i64, len: usize) -> Item {
        let ts = Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap();
        Item::new(id, "", "a".repeat(len), ts)
    }

    fn builder(limits: BatchLimits) -> DynamicBatchBuilder {
        DynamicBatchBuilder::with_counter(limits.with_tokens_per_char(1.0), Arc::new(CharCounter))
    }

    fn limits(max_tokens: usize, max_batch: usize) -> BatchLimits {
        BatchLimits::new()
            .with_max_tokens_per_request(max_tokens)
            .with_max_batch_size(max_batch)
            .with_base_prompt_tokens(0)
            .with_truncation_buffer_tokens(0)
    }

    #[test]
    fn test_empty_input() {
        assert!(builder(limits(100, 10)).build(Vec::new()).is_empty());
    }

    #[test]
    fn test_flushes_when_input_limit_would_be_exceeded() {
        let batches = builder(limits(100, 10)).build(vec![item(1, 50), item(2, 60)]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].item_ids(), vec![1]);
        assert_eq!(batches[0].estimated_tokens, 50);
        assert_eq!(batches[1].item_ids(), vec![2]);
        assert_eq!(batches[1].estimated_tokens, 60);
    }

    #[test]
    fn test_exact_fit_stays_together() {
        let batches = builder(limits(100, 10)).build(vec![item(1, 40), item(2, 60)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].estimated_tokens, 100);
    }

    #[test]
    fn test_batch_size_cap() {
        let items = (1..=7).map(|i| item(i, 1)).collect();
        let batches = builder(limits(1_000, 3)).build(items);
        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_base_prompt_tokens_count_towards_limit() {
        let l = limits(100, 10).with_base_prompt_tokens(30);
        let batches = builder(l).build(vec![item(1, 40), item(2, 40)]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].estimated_tokens, 70);
        assert_eq!(batches[1].estimated_tokens, 70);
    }

    #[test]
    fn test_oversized_item_goes_alone_and_truncated() {
        let l = limits(1_000, 10).with_truncation_buffer_tokens(100);
        let batches = builder(l).build(vec![item(1, 10), item(2, 5_000), item(3, 10)]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].item_ids(), vec![1]);
        assert!(!batches[0].truncated);

        let big = &batches[1];
        assert!(big.truncated);
        assert_eq!(big.item_ids(), vec![2]);
        assert!(big.items[0].truncated);
        assert_eq!(
            big.items[0].content.chars().count(),
            900 + TRUNCATION_MARKER.chars().count()
        );
        assert_eq!(big.items[0].token_estimate, Some(big.estimated_tokens));

        assert_eq!(batches[2].item_ids(), vec![3]);
    }

    #[test]
    fn test_truncation_budget_leaves_room_for_title() {
        let l = limits(1_000, 10).with_truncation_buffer_tokens(100);
        let mut long_title = item(1, 5_000);
        long_title.title = "t".repeat(300);
        let batches = builder(l).build(vec![long_title]);

        let only = &batches[0].items[0];
        assert_eq!(
            only.content.chars().count(),
            600 + TRUNCATION_MARKER.chars().count()
        );
        assert_eq!(only.title.chars().count(), 300);
        assert_eq!(only.token_estimate, Some(900 + TRUNCATION_MARKER.chars().count()));
    }

    #[test]
    fn test_oversized_first_item_leaves_no_empty_batch() {
        let batches = builder(limits(100, 10)).build(vec![item(1, 500), item(2, 10)]);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
        assert!(batches[0].truncated);
    }

    #[test]
    fn test_output_limit_only_when_enabled() {
        let mut l = limits(10_000, 100);
        l.avg_tokens_per_summary = 100;
        l.json_overhead_tokens = 0;
        l.provider_max_output_tokens = 250;
        l.output_safety_margin = 1.0;
        let items: Vec<_> = (1..=5).map(|i| item(i, 1)).collect();

        assert_eq!(builder(l.clone()).build(items.clone()).len(), 1);

        let sizes: Vec<_> = builder(l.with_enforce_output_limit(true))
            .build(items)
            .iter()
            .map(Batch::len)
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_token_estimates_recorded() {
        let batches = builder(limits(100, 10)).build(vec![item(1, 7)]);
        assert_eq!(batches[0].items[0].token_estimate, Some(7));
    }
}
