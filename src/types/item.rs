//! Content item and summarization output types.

use crate::error_code::ErrorType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content item read from the upstream store.
///
/// Items are ordered by `(timestamp, id)`; that pair is also the keyset used by
/// [`crate::source::CursorPager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Token estimate computed by the batch builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_estimate: Option<usize>,
    /// Set when the content was cut down to fit a single request.
    #[serde(default)]
    pub truncated: bool,
    /// Retry context from the last failed dispatch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureAnnotation>,
}

impl Item {
    pub fn new(
        id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            url: None,
            content: content.into(),
            timestamp,
            token_estimate: None,
            truncated: false,
            failure: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Keyset position of this item.
    pub fn position(&self) -> (DateTime<Utc>, i64) {
        (self.timestamp, self.id)
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Failure context persisted with an item so the next run (and a human) can
/// see why it was not summarized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnnotation {
    pub error_type: ErrorType,
    pub error_message: String,
    /// Size of the batch the item was dispatched in.
    pub batch_size: usize,
    /// True when the whole batch failed together; false for an item-level rejection.
    pub is_batch_failure: bool,
}

/// Summarization output for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

impl Summary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            categories: Vec::new(),
            preview: None,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }
}

/// An item that was summarized successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizedItem {
    pub item: Item,
    pub summary: Summary,
}
