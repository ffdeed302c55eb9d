//! Collaborator traits for the upstream store.

use super::cursor::Cursor;
use crate::types::Item;
use crate::Result;
use async_trait::async_trait;

/// Ordered source of items.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Up to `limit` items strictly after `after`, ascending by `(timestamp, id)`.
    async fn fetch_page(&self, after: &Cursor, limit: usize) -> Result<Vec<Item>>;
}

/// Blob storage for pager checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;
    async fn save(&self, key: &str, blob: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
}
