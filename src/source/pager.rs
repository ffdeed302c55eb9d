//! Resumable keyset pager.

use super::cursor::{Checkpoint, Cursor};
use super::traits::{CheckpointStore, ItemSource};
use crate::types::Item;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub page_size: usize,
    /// Upper bound on items read per run; `None` reads until the source is exhausted.
    /// The next run continues after the last checkpointed item.
    pub max_count: Option<usize>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_count: None,
        }
    }
}

/// Reads an ordered source page by page, strictly after a persisted cursor.
///
/// The cursor moves forward on every `read`; it only reaches the checkpoint
/// store on `update`, which callers invoke once a page has been fully handled.
pub struct CursorPager {
    name: String,
    source: Arc<dyn ItemSource>,
    store: Arc<dyn CheckpointStore>,
    config: ReaderConfig,
    cursor: Cursor,
    pages_read: usize,
    read_this_run: usize,
}

impl CursorPager {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn ItemSource>,
        store: Arc<dyn CheckpointStore>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            store,
            config,
            cursor: Cursor::new(),
            pages_read: 0,
            read_this_run: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn checkpoint_key(&self) -> String {
        format!("{}.cursor", self.name)
    }

    fn error_context(&self) -> ErrorContext {
        ErrorContext::new()
            .with_field_path(self.checkpoint_key())
            .with_source("cursor_pager")
    }

    /// Restore the cursor from the checkpoint store, or start from the beginning.
    pub async fn open(&mut self) -> Result<()> {
        let key = self.checkpoint_key();
        self.cursor = match self.store.load(&key).await? {
            Some(blob) => {
                let checkpoint: Checkpoint = serde_json::from_str(&blob).map_err(|e| {
                    Error::checkpoint_with_context(
                        format!("corrupt checkpoint: {}", e),
                        self.error_context(),
                    )
                })?;
                Cursor::from(checkpoint)
            }
            None => Cursor::new(),
        };
        self.pages_read = 0;
        self.read_this_run = 0;
        info!(
            pager = %self.name,
            last_id = ?self.cursor.last_id,
            last_timestamp = ?self.cursor.last_timestamp,
            processed = self.cursor.processed_count,
            "pager opened"
        );
        Ok(())
    }

    fn remaining(&self) -> usize {
        match self.config.max_count {
            Some(max) => max.saturating_sub(self.read_this_run),
            None => usize::MAX,
        }
    }

    /// Next page, or `None` once `max_count` is reached or the source is drained.
    pub async fn read(&mut self) -> Result<Option<Vec<Item>>> {
        let limit = self.config.page_size.min(self.remaining());
        if limit == 0 {
            return Ok(None);
        }

        let mut page = self.source.fetch_page(&self.cursor, limit).await?;
        if page.is_empty() {
            return Ok(None);
        }
        page.truncate(limit);
        self.check_order(&page)?;

        self.cursor.advance(&page);
        self.pages_read += 1;
        self.read_this_run += page.len();
        debug!(
            pager = %self.name,
            page = self.pages_read,
            items = page.len(),
            processed = self.cursor.processed_count,
            "page read"
        );
        Ok(Some(page))
    }

    fn check_order(&self, page: &[Item]) -> Result<()> {
        let first_ok = page.first().map_or(true, |i| self.cursor.precedes(i));
        let sorted = page.windows(2).all(|w| w[0].position() < w[1].position());
        if first_ok && sorted {
            Ok(())
        } else {
            Err(Error::source_with_context(
                "source returned a page that is not strictly after the cursor in (timestamp, id) order",
                self.error_context(),
            ))
        }
    }

    /// Persist the current cursor.
    pub async fn update(&self) -> Result<()> {
        let blob = serde_json::to_string(&Checkpoint::from(&self.cursor))?;
        self.store.save(&self.checkpoint_key(), &blob).await?;
        debug!(pager = %self.name, processed = self.cursor.processed_count, "checkpoint saved");
        Ok(())
    }

    /// Forget the persisted cursor so the next run starts from the beginning.
    ///
    /// An operator action; a finished run keeps its checkpoint.
    pub async fn reset(&mut self) -> Result<()> {
        self.store.delete(&self.checkpoint_key()).await?;
        self.cursor = Cursor::new();
        Ok(())
    }

    pub fn close(&self) {
        info!(
            pager = %self.name,
            pages = self.pages_read,
            read = self.read_this_run,
            processed = self.cursor.processed_count,
            last_id = ?self.cursor.last_id,
            "pager closed"
        );
    }
}
