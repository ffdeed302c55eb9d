//! Batch, request and result types.

use crate::error_code::ErrorType;
use crate::types::{Item, SummarizedItem};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// A token-bounded group of items produced by the builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub items: Vec<Item>,
    pub estimated_tokens: usize,
    /// A single oversized item that was truncated to fit; exempt from the token bound.
    pub truncated: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.id).collect()
    }
}

/// A batch wrapped with dispatch metadata.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: Uuid,
    pub items: Vec<Item>,
    pub estimated_tokens: usize,
    /// Carried for downstream consumers; dispatch does not reorder on it.
    pub priority: i32,
}

impl BatchRequest {
    pub fn new(batch: Batch) -> Self {
        Self {
            id: Uuid::new_v4(),
            items: batch.items,
            estimated_tokens: batch.estimated_tokens,
            priority: 0,
        }
    }
    pub fn with_priority(mut self, p: i32) -> Self {
        self.priority = p;
        self
    }
}

impl From<Batch> for BatchRequest {
    fn from(batch: Batch) -> Self {
        Self::new(batch)
    }
}

/// A final failure for one item of a dispatched batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub item: Item,
    pub reason: String,
    pub retryable: bool,
    pub error_type: ErrorType,
    /// True when the whole batch failed together.
    pub is_batch_failure: bool,
    pub batch_size: usize,
}

impl BatchFailure {
    /// Failure shared by every item of a batch.
    pub fn batch_level(
        item: Item,
        error_type: ErrorType,
        reason: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            item,
            reason: reason.into(),
            retryable: error_type.retryable(),
            error_type,
            is_batch_failure: true,
            batch_size,
        }
    }

    /// Rejection of a single item inside an otherwise successful batch.
    pub fn item_level(
        item: Item,
        error_type: ErrorType,
        reason: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            is_batch_failure: false,
            ..Self::batch_level(item, error_type, reason, batch_size)
        }
    }

    pub fn item_id(&self) -> i64 {
        self.item.id
    }
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failure for item {} ({}): {}",
            if self.is_batch_failure { "batch" } else { "item" },
            self.item.id,
            self.error_type,
            self.reason
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMetrics {
    pub item_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Calls made to the summarizer, including retries.
    pub attempts: u32,
    pub estimated_tokens: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub request_id: Uuid,
    pub successes: Vec<SummarizedItem>,
    pub failures: Vec<BatchFailure>,
    pub metrics: BatchMetrics,
}

impl BatchResult {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            successes: Vec::new(),
            failures: Vec::new(),
            metrics: BatchMetrics::default(),
        }
    }
    pub fn add_success(&mut self, s: SummarizedItem) {
        self.successes.push(s);
    }
    pub fn add_failure(&mut self, f: BatchFailure) {
        self.failures.push(f);
    }
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.successes.len() as f64 / total as f64
        }
    }
    pub fn retryable_failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.failures.iter().filter(|f| f.retryable)
    }
}
