//! Retry queue service and storage.

use super::entry::RetryQueueEntry;
use crate::batch::BatchFailure;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryQueueConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 60_000,
        }
    }
}

impl RetryQueueConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[async_trait]
pub trait RetryQueueStore: Send + Sync {
    async fn get(&self, item_id: i64) -> Result<Option<RetryQueueEntry>>;
    async fn upsert(&self, entry: RetryQueueEntry) -> Result<()>;
    async fn remove(&self, item_id: i64) -> Result<bool>;
    async fn list(&self) -> Result<Vec<RetryQueueEntry>>;
}

#[derive(Clone, Default)]
pub struct MemoryRetryQueueStore {
    entries: Arc<RwLock<HashMap<i64, RetryQueueEntry>>>,
}

impl MemoryRetryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetryQueueStore for MemoryRetryQueueStore {
    async fn get(&self, item_id: i64) -> Result<Option<RetryQueueEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&item_id)
            .cloned())
    }

    async fn upsert(&self, entry: RetryQueueEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.item_id, entry);
        Ok(())
    }

    async fn remove(&self, item_id: i64) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&item_id)
            .is_some())
    }

    async fn list(&self) -> Result<Vec<RetryQueueEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}

/// What `record_failures` did with a set of failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryQueueReport {
    pub enqueued: usize,
    pub rescheduled: usize,
    /// Entries removed because they ran out of retries.
    pub exhausted: usize,
    /// Non-retryable failures; any existing entry is removed.
    pub permanent: usize,
}

/// Delayed-retry bookkeeping on top of a [`RetryQueueStore`].
pub struct RetryQueue {
    store: Arc<dyn RetryQueueStore>,
    config: RetryQueueConfig,
}

impl RetryQueue {
    pub fn new(store: Arc<dyn RetryQueueStore>, config: RetryQueueConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetryQueueConfig {
        &self.config
    }

    pub async fn record_failures(&self, failures: &[BatchFailure]) -> Result<RetryQueueReport> {
        self.record_failures_at(failures, Utc::now()).await
    }

    pub async fn record_failures_at(
        &self,
        failures: &[BatchFailure],
        now: DateTime<Utc>,
    ) -> Result<RetryQueueReport> {
        let mut report = RetryQueueReport::default();
        let base = self.config.base_delay();

        for f in failures {
            let id = f.item_id();
            if !f.retryable {
                self.store.remove(id).await?;
                report.permanent += 1;
                continue;
            }

            match self.store.get(id).await? {
                None => {
                    let entry = RetryQueueEntry::new(
                        id,
                        f.reason.clone(),
                        f.error_type,
                        self.config.max_retries,
                        base,
                        now,
                    );
                    debug!(item_id = id, next_retry_at = %entry.next_retry_at, "retry enqueued");
                    self.store.upsert(entry).await?;
                    report.enqueued += 1;
                }
                Some(existing) => {
                    let next = existing
                        .incremented_at(base, now)
                        .with_failure(f.reason.clone(), f.error_type);
                    if next.retry_count > next.max_retries {
                        info!(item_id = id, retries = existing.retry_count, "retries exhausted, giving up");
                        self.store.remove(id).await?;
                        report.exhausted += 1;
                    } else {
                        debug!(
                            item_id = id,
                            retry_count = next.retry_count,
                            next_retry_at = %next.next_retry_at,
                            "retry rescheduled"
                        );
                        self.store.upsert(next).await?;
                        report.rescheduled += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Drop entries for items that have now been summarized.
    pub async fn record_successes<I>(&self, item_ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut removed = 0;
        for id in item_ids {
            if self.store.remove(id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Entries ready for another attempt, earliest first.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<RetryQueueEntry>> {
        let mut due: Vec<_> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|e| e.should_retry_at(now))
            .collect();
        due.sort_by_key(|e| (e.next_retry_at, e.item_id));
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorType;
    use crate::types::Item;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn failure(id: i64, ty: ErrorType) -> BatchFailure {
        BatchFailure::batch_level(Item::new(id, "t", "c", t0()), ty, "boom", 1)
    }

    fn queue(max_retries: u32) -> (RetryQueue, MemoryRetryQueueStore) {
        let store = MemoryRetryQueueStore::new();
        let q = RetryQueue::new(
            Arc::new(store.clone()),
            RetryQueueConfig {
                max_retries,
                base_delay_ms: 1_000,
            },
        );
        (q, store)
    }

    #[tokio::test]
    async fn test_enqueue_then_reschedule_then_exhaust() {
        let (q, store) = queue(1);
        let f = [failure(1, ErrorType::Timeout)];

        let r = q.record_failures_at(&f, t0()).await.unwrap();
        assert_eq!(r.enqueued, 1);
        let r = q.record_failures_at(&f, t0()).await.unwrap();
        assert_eq!(r.rescheduled, 1);
        assert_eq!(store.get(1).await.unwrap().unwrap().retry_count, 1);

        let r = q.record_failures_at(&f, t0()).await.unwrap();
        assert_eq!(r.exhausted, 1);
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_clears_entry() {
        let (q, store) = queue(3);
        q.record_failures_at(&[failure(1, ErrorType::ApiError)], t0())
            .await
            .unwrap();
        let r = q
            .record_failures_at(&[failure(1, ErrorType::SafetyBlocked)], t0())
            .await
            .unwrap();
        assert_eq!(r.permanent, 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_and_successes() {
        let (q, _store) = queue(3);
        q.record_failures_at(
            &[failure(1, ErrorType::RateLimit), failure(2, ErrorType::Timeout)],
            t0(),
        )
        .await
        .unwrap();

        assert!(q.due(t0()).await.unwrap().is_empty());
        let later = t0() + chrono::Duration::seconds(2);
        let due: Vec<_> = q.due(later).await.unwrap().iter().map(|e| e.item_id).collect();
        assert_eq!(due, vec![1, 2]);

        assert_eq!(q.record_successes([1, 42]).await.unwrap(), 1);
        assert_eq!(q.due(later).await.unwrap().len(), 1);
    }
}
