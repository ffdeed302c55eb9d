//! Mapping dispatch outcomes back onto the items as read.

use crate::batch::BatchFailure;
use crate::error_code::ErrorType;
use crate::types::{FailureAnnotation, Item, SummarizedItem};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Rebuild the original items that did not succeed, stamped with failure context.
///
/// Items come back in their original order with their full (untruncated)
/// content, ready to be written back as not-yet-summarized. An item with
/// neither a success nor a failure recorded is annotated as `UNKNOWN` rather
/// than dropped.
pub fn map_failures_to_items(
    original: &[Item],
    successes: &[SummarizedItem],
    failures: &[BatchFailure],
) -> Vec<Item> {
    let succeeded: HashSet<i64> = successes.iter().map(|s| s.item.id).collect();
    let failed: HashMap<i64, &BatchFailure> = failures.iter().map(|f| (f.item_id(), f)).collect();

    original
        .iter()
        .filter(|item| !succeeded.contains(&item.id))
        .map(|item| {
            let annotation = match failed.get(&item.id) {
                Some(f) => FailureAnnotation {
                    error_type: f.error_type,
                    error_message: f.reason.clone(),
                    batch_size: f.batch_size,
                    is_batch_failure: f.is_batch_failure,
                },
                None => {
                    warn!(item_id = item.id, "item has no recorded outcome");
                    FailureAnnotation {
                        error_type: ErrorType::Unknown,
                        error_message: "no outcome recorded for item".to_string(),
                        batch_size: 0,
                        is_batch_failure: false,
                    }
                }
            };
            Item {
                failure: Some(annotation),
                ..item.clone()
            }
        })
        .collect()
}

/// Swap each summarized item for its counterpart in `original`, so writers
/// see the content as read rather than a truncated copy.
pub fn map_successes_to_items(original: &[Item], successes: Vec<SummarizedItem>) -> Vec<SummarizedItem> {
    let by_id: HashMap<i64, &Item> = original.iter().map(|i| (i.id, i)).collect();
    successes
        .into_iter()
        .map(|s| match by_id.get(&s.item.id) {
            Some(item) => SummarizedItem {
                item: (*item).clone(),
                summary: s.summary,
            },
            None => s,
        })
        .collect()
}
