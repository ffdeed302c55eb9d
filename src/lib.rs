//! # ai-batch-pipeline
//!
//! 面向 LLM 摘要服务的自适应批处理、按域名限流与失败重试分类管线。
//!
//! Token-bounded batching, domain-scoped rate limiting and retry
//! classification for pipelines that summarize content items through an
//! external LLM service.
//!
//! ## Overview
//!
//! A run reads unsummarized items page by page from an ordered source, packs
//! them into requests that stay under the provider's token ceilings, dispatches
//! those requests with bounded concurrency, and writes every item back either
//! as summarized or as failed with enough context to be picked up again.
//!
//! ## Core Guarantees
//!
//! - **Token-bounded**: every batch fits `max_tokens_per_request`, except a single
//!   oversized item that is truncated and sent alone
//! - **Resumable**: keyset pagination on `(timestamp, id)` with a checkpoint that
//!   only advances once a page is fully resolved
//! - **Nothing dropped**: each dispatched item ends up as exactly one success or one failure
//! - **Rate-safe**: one shared token bucket per destination host and tier
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_batch_pipeline::config::PipelineConfig;
//! use ai_batch_pipeline::job::{MemoryItemWriter, SummaryJob};
//! use ai_batch_pipeline::orchestrator::{DispatchError, Summarizer, SummaryResponse};
//! use ai_batch_pipeline::source::MemoryItemSource;
//! use ai_batch_pipeline::types::Item;
//! use std::sync::Arc;
//!
//! struct MyClient;
//!
//! #[async_trait::async_trait]
//! impl Summarizer for MyClient {
//!     async fn summarize(&self, items: &[Item]) -> Result<SummaryResponse, DispatchError> {
//!         unimplemented!("call the provider")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ai_batch_pipeline::Result<()> {
//!     let mut job = SummaryJob::builder(PipelineConfig::load(None)?)
//!         .source(Arc::new(MemoryItemSource::new(Vec::new())))
//!         .summarizer(Arc::new(MyClient))
//!         .writer(Arc::new(MemoryItemWriter::new()))
//!         .build()?;
//!     let report = job.run().await?;
//!     println!("summarized {} items", report.summarized);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Items, summaries and failure annotations |
//! | [`tokens`] | Pluggable token estimation |
//! | [`batch`] | Limit policy, truncation and the dynamic batch builder |
//! | [`source`] | Cursor pager over an ordered item source, checkpoints |
//! | [`resilience`] | Token-bucket limiter and per-domain limiter registry |
//! | [`orchestrator`] | Concurrent dispatch with timeouts and classified retries |
//! | [`retry`] | Delayed-retry queue and failure-to-item mapping |
//! | [`job`] | The end-to-end summary job |
//! | [`config`] | YAML and environment configuration |
//! | [`error_code`] | Closed failure classification |

pub mod batch;
pub mod config;
pub mod error_code;
pub mod job;
pub mod orchestrator;
pub mod resilience;
pub mod retry;
pub mod source;
pub mod tokens;
pub mod types;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
