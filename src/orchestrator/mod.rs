//! 批量摘要调度模块：并发受限的批次派发、超时、分类重试与结果汇总。
//!
//! # Batch Summarization Orchestrator
//!
//! The only concurrent region of the pipeline. Each [`crate::batch::BatchRequest`]
//! is sent to the external [`Summarizer`] under a global concurrency cap, with a
//! hard per-call deadline and class-aware exponential backoff for transient
//! failures.
//!
//! ## Failure model
//!
//! - **Batch-level**: the call itself failed (after retries, or immediately for
//!   non-retryable classes). Every item of the batch is recorded with the
//!   shared reason and `is_batch_failure = true`.
//! - **Item-level**: the call succeeded but the provider rejected or omitted
//!   some ids. Only those items fail, with `is_batch_failure = false`.
//!
//! Sibling requests are isolated: one request failing never affects another,
//! and no error crosses a task boundary.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchOrchestrator`] | Concurrent dispatcher |
//! | [`DispatchConfig`] | Concurrency, timeout and retry settings |
//! | [`RetryDelays`] | Per-class backoff bases |
//! | [`Summarizer`] | External API contract |
//! | [`DispatchError`] | Whole-call failure classified at the client boundary |

mod executor;
mod retry;
mod summarizer;

pub use executor::{BatchOrchestrator, DispatchConfig};
pub use retry::RetryDelays;
pub use summarizer::{DispatchError, ItemOutcome, ProviderItemError, Summarizer, SummaryResponse};
