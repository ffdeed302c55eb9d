//! 弹性模式模块：提供按目标域名分级的限流器与请求抖动。
//!
//! # Resilience Primitives Module
//!
//! Outbound traffic, both to the summarization API and to third-party sites
//! being crawled, must never exceed the destination's request-rate contract.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Token bucket limiter with bounded blocking acquire |
//! | [`DomainRateLimiterManager`] | Shared limiter per `(host, tier)` plus jitter |
//!
//! ## Domain Limiters
//!
//! Each host maps to a [`RateLimitTier`] through a static table; unknown hosts
//! get the most restrictive tier. All callers targeting a host share one
//! limiter instance:
//!
//! ```rust
//! use ai_batch_pipeline::resilience::{
//!     DomainRateLimiterManager, JitterConfig, RateLimitSettings, RateLimitTier,
//! };
//! use std::sync::Arc;
//!
//! let manager = DomainRateLimiterManager::new(RateLimitSettings::default(), JitterConfig::disabled());
//! let key = manager.key_for("https://foo.example.com/feed.xml").unwrap();
//! assert_eq!(key.tier, RateLimitTier::UltraSafe);
//!
//! let a = manager.limiter_for("https://foo.example.com/a").unwrap();
//! let b = manager.limiter_for("https://foo.example.com/b").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

mod domain;
pub mod rate_limiter;

pub use domain::{
    extract_host, DomainRateLimiterManager, JitterConfig, RateLimitSettings, RateLimitTier,
    RateLimiterKey, TierConfig,
};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterSnapshot};
