//! Pipeline configuration.
//!
//! Every section has working defaults, so an empty YAML document is a valid
//! configuration. Values are layered: defaults, then the YAML file, then
//! `AI_BATCH_*` environment variables.
//!
//! ```yaml
//! name: post-summaries
//! batch:
//!   max_tokens_per_request: 100000
//!   max_batch_size: 20
//! dispatch:
//!   concurrency_limit: 2
//!   retry:
//!     rate_limit_base_delay_ms: 5000
//! rate_limits:
//!   hosts:
//!     medium.com: conservative
//! jitter:
//!   enabled: true
//!   min_ms: 500
//!   max_ms: 2000
//! ```

use crate::batch::BatchLimits;
use crate::orchestrator::DispatchConfig;
use crate::resilience::{JitterConfig, RateLimitSettings};
use crate::retry::RetryQueueConfig;
use crate::source::ReaderConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prefix for checkpoint keys.
    pub name: String,
    pub batch: BatchLimits,
    pub dispatch: DispatchConfig,
    pub reader: ReaderConfig,
    pub retry_queue: RetryQueueConfig,
    pub rate_limits: RateLimitSettings,
    pub jitter: JitterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "post-summaries".to_string(),
            batch: BatchLimits::default(),
            dispatch: DispatchConfig::default(),
            reader: ReaderConfig::default(),
            retry_queue: RetryQueueConfig::default(),
            rate_limits: RateLimitSettings::default(),
            jitter: JitterConfig::default(),
        }
    }
}

fn config_error(field: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("pipeline_config"),
    )
}

fn override_value<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "ignoring unparsable configuration override"),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Defaults or `path`, then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|key| std::env::var(key).ok());
    }

    /// Apply `AI_BATCH_*` overrides from an arbitrary lookup.
    pub fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        override_value(lookup, "AI_BATCH_MAX_TOKENS_PER_REQUEST", &mut self.batch.max_tokens_per_request);
        override_value(lookup, "AI_BATCH_MAX_BATCH_SIZE", &mut self.batch.max_batch_size);
        override_value(lookup, "AI_BATCH_BASE_PROMPT_TOKENS", &mut self.batch.base_prompt_tokens);
        override_value(lookup, "AI_BATCH_TOKENS_PER_CHAR", &mut self.batch.tokens_per_char);
        override_value(lookup, "AI_BATCH_CONCURRENCY", &mut self.dispatch.concurrency_limit);
        override_value(lookup, "AI_BATCH_TIMEOUT_MS", &mut self.dispatch.timeout_ms);
        override_value(lookup, "AI_BATCH_MAX_RETRY_ATTEMPTS", &mut self.dispatch.max_retry_attempts);
        override_value(lookup, "AI_BATCH_PAGE_SIZE", &mut self.reader.page_size);
        override_value(lookup, "AI_BATCH_JITTER_ENABLED", &mut self.jitter.enabled);
        if let Some(raw) = lookup("AI_BATCH_MAX_COUNT") {
            match raw.trim().parse::<usize>() {
                Ok(v) => self.reader.max_count = Some(v),
                Err(_) => warn!(key = "AI_BATCH_MAX_COUNT", value = %raw, "ignoring unparsable configuration override"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.batch;
        if self.name.trim().is_empty() {
            return Err(config_error("name", "pipeline name must not be empty"));
        }
        if b.max_tokens_per_request == 0 {
            return Err(config_error("batch.max_tokens_per_request", "must be positive"));
        }
        if b.max_batch_size == 0 {
            return Err(config_error("batch.max_batch_size", "must be positive"));
        }
        if !(b.tokens_per_char.is_finite() && b.tokens_per_char > 0.0) {
            return Err(config_error("batch.tokens_per_char", "must be a positive number"));
        }
        if !(b.output_safety_margin > 0.0 && b.output_safety_margin <= 1.0) {
            return Err(config_error("batch.output_safety_margin", "must be in (0, 1]"));
        }
        if b.truncation_buffer_tokens >= b.max_tokens_per_request {
            return Err(config_error(
                "batch.truncation_buffer_tokens",
                "must be smaller than max_tokens_per_request",
            ));
        }
        if self.dispatch.concurrency_limit == 0 {
            return Err(config_error("dispatch.concurrency_limit", "must be positive"));
        }
        if self.dispatch.timeout_ms == 0 {
            return Err(config_error("dispatch.timeout_ms", "must be positive"));
        }
        if self.dispatch.max_retry_attempts == 0 {
            return Err(config_error(
                "dispatch.max_retry_attempts",
                "must allow at least one attempt",
            ));
        }
        if self.reader.page_size == 0 {
            return Err(config_error("reader.page_size", "must be positive"));
        }
        if self.jitter.min_ms > self.jitter.max_ms {
            return Err(config_error("jitter.min_ms", "must not exceed jitter.max_ms"));
        }
        for (name, tier) in [
            ("rate_limits.standard", &self.rate_limits.standard),
            ("rate_limits.conservative", &self.rate_limits.conservative),
            ("rate_limits.ultra_safe", &self.rate_limits.ultra_safe),
        ] {
            if tier.limit_for_period == 0 || tier.refresh_period_secs == 0 {
                return Err(config_error(
                    name,
                    "limit_for_period and refresh_period_secs must be positive",
                ));
            }
        }
        Ok(())
    }
}
