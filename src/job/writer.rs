//! Downstream persistence of job outcomes.

use crate::types::{Item, SummarizedItem};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Writes resolved items back to the item store.
///
/// Both calls may see the same item again on a later run; implementations
/// must treat them as idempotent upserts keyed by item id.
#[async_trait]
pub trait ItemWriter: Send + Sync {
    /// Persist summaries and mark the items as processed.
    async fn write_summaries(&self, items: &[SummarizedItem]) -> Result<()>;

    /// Persist failure annotations; the items stay unsummarized.
    async fn write_failures(&self, items: &[Item]) -> Result<()>;
}

#[derive(Default)]
struct Written {
    summaries: BTreeMap<i64, SummarizedItem>,
    failures: BTreeMap<i64, Item>,
}

/// In-memory writer, keyed by item id.
#[derive(Clone, Default)]
pub struct MemoryItemWriter {
    inner: Arc<RwLock<Written>>,
}

impl MemoryItemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> Vec<SummarizedItem> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.summaries.values().cloned().collect()
    }

    pub fn failures(&self) -> Vec<Item> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.failures.values().cloned().collect()
    }

    pub fn summary_for(&self, id: i64) -> Option<SummarizedItem> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.summaries.get(&id).cloned()
    }

    pub fn failure_for(&self, id: i64) -> Option<Item> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.failures.get(&id).cloned()
    }
}

#[async_trait]
impl ItemWriter for MemoryItemWriter {
    async fn write_summaries(&self, items: &[SummarizedItem]) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for s in items {
            // a summarized item is no longer failed
            inner.failures.remove(&s.item.id);
            inner.summaries.insert(s.item.id, s.clone());
        }
        Ok(())
    }

    async fn write_failures(&self, items: &[Item]) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for item in items {
            inner.failures.insert(item.id, item.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorType;
    use crate::types::{FailureAnnotation, Summary};
    use chrono::Utc;

    #[tokio::test]
    async fn test_success_clears_previous_failure() {
        let writer = MemoryItemWriter::new();
        let mut item = Item::new(3, "t", "c", Utc::now());
        item.failure = Some(FailureAnnotation {
            error_type: ErrorType::Timeout,
            error_message: "slow".into(),
            batch_size: 4,
            is_batch_failure: true,
        });
        writer.write_failures(&[item.clone()]).await.unwrap();
        assert!(writer.failure_for(3).is_some());

        writer
            .write_summaries(&[SummarizedItem {
                item: Item { failure: None, ..item },
                summary: Summary::new("done"),
            }])
            .await
            .unwrap();
        assert!(writer.failure_for(3).is_none());
        assert_eq!(writer.summary_for(3).unwrap().summary.summary, "done");
    }

    #[tokio::test]
    async fn test_writes_are_upserts() {
        let writer = MemoryItemWriter::new();
        let item = Item::new(1, "t", "c", Utc::now());
        writer.write_failures(&[item.clone()]).await.unwrap();
        writer.write_failures(&[item]).await.unwrap();
        assert_eq!(writer.failures().len(), 1);
    }
}
