//! 请求批处理模块：按 Token 上限动态打包内容条目。
//!
//! # Request Batching Module
//!
//! Packs variable-length content items into summarization requests that respect
//! the provider's hard token ceilings.
//!
//! ## Overview
//!
//! LLM providers cap both the request payload and the response size. The
//! builder keeps every batch under the input ceiling (and, optionally, the
//! expected output ceiling) while preserving item order, so a pipeline can
//! checkpoint by position and never skip or duplicate work.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchLimits`] | Configured thresholds (tokens, batch size, output budget) |
//! | [`BatchLimitPolicy`] | Pure predicates over the thresholds |
//! | [`ItemTruncator`] | Shrinks an oversized item to a token budget |
//! | [`DynamicBatchBuilder`] | Single-pass packing algorithm |
//! | [`Batch`] / [`BatchRequest`] | Packed items and their dispatch wrapper |
//! | [`BatchResult`] / [`BatchFailure`] | Per-request outcome of a dispatch |
//!
//! ## Example
//!
//! ```rust
//! use ai_batch_pipeline::batch::{BatchLimits, DynamicBatchBuilder};
//! use ai_batch_pipeline::types::Item;
//! use chrono::Utc;
//!
//! let limits = BatchLimits::new()
//!     .with_max_tokens_per_request(1_000)
//!     .with_max_batch_size(10)
//!     .with_base_prompt_tokens(0);
//! let builder = DynamicBatchBuilder::new(limits);
//!
//! let items = vec![
//!     Item::new(1, "First", "a short body", Utc::now()),
//!     Item::new(2, "Second", "another short body", Utc::now()),
//! ];
//! let batches = builder.build(items);
//! assert_eq!(batches.len(), 1);
//! ```

mod builder;
mod policy;
mod truncator;
mod types;

pub use builder::DynamicBatchBuilder;
pub use policy::{BatchLimitPolicy, BatchLimits};
pub use truncator::{ItemTruncator, TRUNCATION_MARKER};
pub use types::{Batch, BatchFailure, BatchMetrics, BatchRequest, BatchResult};
