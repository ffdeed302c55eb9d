//! 重试队列模块：失败条目的指数退避重试记录与诊断信息回填。
//!
//! # Retry Queue / Failure Mapper
//!
//! Final dispatch failures are never dropped. They go two ways:
//!
//! - [`map_failures_to_items`] stamps each failed item with a
//!   [`crate::types::FailureAnnotation`] so the writer can persist it as
//!   not-yet-summarized; the next run picks it up again.
//! - [`RetryQueue`] keeps a delayed-retry schedule for retryable failures,
//!   backing off exponentially (`base_delay * 2^retry_count`) until
//!   `max_retries` is reached.
//!
//! ```rust
//! use ai_batch_pipeline::error_code::ErrorType;
//! use ai_batch_pipeline::retry::RetryQueueEntry;
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! let now = Utc::now();
//! let entry = RetryQueueEntry::new(42, "timeout", ErrorType::Timeout, 3, Duration::from_secs(60), now);
//! let next = entry.incremented_at(Duration::from_secs(60), now);
//! assert!(next.next_retry_at > entry.next_retry_at);
//! ```

mod entry;
mod mapper;
mod queue;

pub use entry::RetryQueueEntry;
pub use mapper::{map_failures_to_items, map_successes_to_items};
pub use queue::{
    MemoryRetryQueueStore, RetryQueue, RetryQueueConfig, RetryQueueReport, RetryQueueStore,
};
