//! Token 估算模块：为批处理打包提供可插拔的 Token 估算器。
//!
//! # Token Estimation Module
//!
//! The batch builder needs a token estimate for every item before it can pack
//! requests under the provider's input ceiling. Exact tokenizer fidelity is not
//! required: a character-based heuristic is fast, deterministic and good enough
//! to keep batches below the limit once a safety buffer is configured.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token estimation implementations |
//! | [`CharacterEstimator`] | Character-based approximation (4 chars ≈ 1 token by default) |
//!
//! ## Example
//!
//! ```rust
//! use ai_batch_pipeline::tokens::{CharacterEstimator, TokenCounter};
//!
//! let counter = CharacterEstimator::from_tokens_per_char(0.25);
//! assert_eq!(counter.count("abcdefgh"), 2);
//! ```

mod counter;

pub use counter::{CharacterEstimator, TokenCounter};
