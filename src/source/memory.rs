//! In-memory source and checkpoint store.

use super::cursor::Cursor;
use super::traits::{CheckpointStore, ItemSource};
use crate::types::Item;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Item source backed by a sorted vector. Useful for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryItemSource {
    items: Arc<RwLock<Vec<Item>>>,
}

impl MemoryItemSource {
    pub fn new(items: Vec<Item>) -> Self {
        let source = Self::default();
        for item in items {
            source.insert(item);
        }
        source
    }

    /// Insert keeping `(timestamp, id)` order.
    pub fn insert(&self, item: Item) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let pos = items.partition_point(|i| i.position() < item.position());
        items.insert(pos, item);
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemSource for MemoryItemSource {
    async fn fetch_page(&self, after: &Cursor, limit: usize) -> Result<Vec<Item>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items
            .iter()
            .filter(|i| after.precedes(i))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, blob: &str) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tokio_test::{assert_ok, block_on};

    #[test]
    fn test_insert_keeps_keyset_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = MemoryItemSource::new(vec![
            Item::new(3, "c", "", t0 + Duration::seconds(1)),
            Item::new(2, "b", "", t0),
            Item::new(1, "a", "", t0),
        ]);
        // same timestamp: ordered by id
        let page = assert_ok!(block_on(source.fetch_page(&Cursor::new(), 10)));
        let ids: Vec<i64> = page.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let mut cursor = Cursor::new();
        cursor.advance(&page[..2]);
        let rest = assert_ok!(block_on(source.fetch_page(&cursor, 10)));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, 3);
    }

    #[test]
    fn test_checkpoint_store_round_trip() {
        let store = MemoryCheckpointStore::new();
        assert_ok!(block_on(store.save("job.cursor", "{}")));
        assert_eq!(store.get("job.cursor").as_deref(), Some("{}"));
        assert!(assert_ok!(block_on(store.delete("job.cursor"))));
        assert!(!assert_ok!(block_on(store.delete("job.cursor"))));
    }
}
