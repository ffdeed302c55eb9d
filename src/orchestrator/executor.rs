//! Batch summarization orchestrator.

use super::retry::RetryDelays;
use super::summarizer::{DispatchError, ItemOutcome, Summarizer, SummaryResponse};
use crate::batch::{BatchFailure, BatchRequest, BatchResult};
use crate::error_code::ErrorType;
use crate::resilience::{DomainRateLimiterManager, RateLimiter};
use crate::types::SummarizedItem;
use crate::Result;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum in-flight summarization calls.
    pub concurrency_limit: usize,
    /// Hard deadline per call.
    pub timeout_ms: u64,
    /// Total attempts per batch, including the first call.
    pub max_retry_attempts: u32,
    pub retry: RetryDelays,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 2,
            timeout_ms: 120_000,
            max_retry_attempts: 3,
            retry: RetryDelays::default(),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_concurrency_limit(mut self, n: usize) -> Self {
        self.concurrency_limit = n;
        self
    }
    pub fn with_timeout(mut self, t: Duration) -> Self {
        self.timeout_ms = t.as_millis() as u64;
        self
    }
    pub fn with_max_retry_attempts(mut self, n: u32) -> Self {
        self.max_retry_attempts = n;
        self
    }
    pub fn with_retry_delays(mut self, r: RetryDelays) -> Self {
        self.retry = r;
        self
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Dispatches batch requests to a [`Summarizer`] with bounded concurrency,
/// per-call deadlines and classified retries.
///
/// Dispatch never fails as a whole: every item of every request ends up either
/// in `successes` or in `failures` of its request's [`BatchResult`].
pub struct BatchOrchestrator {
    summarizer: Arc<dyn Summarizer>,
    config: DispatchConfig,
    api_limiter: Option<Arc<RateLimiter>>,
}

impl BatchOrchestrator {
    pub fn new(summarizer: Arc<dyn Summarizer>, config: DispatchConfig) -> Self {
        Self {
            summarizer,
            config,
            api_limiter: None,
        }
    }

    /// Draw a permit from the limiter of `endpoint` before every call.
    pub fn with_rate_limiter(
        mut self,
        manager: &DomainRateLimiterManager,
        endpoint: &str,
    ) -> Result<Self> {
        self.api_limiter = Some(manager.limiter_for(endpoint)?);
        Ok(self)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Results come back in dispatch order, one per request.
    pub async fn process_batches(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        let n = requests.len();
        if n == 0 {
            return Vec::new();
        }
        let limit = self.config.concurrency_limit.max(1);

        let mut results: Vec<(usize, BatchResult)> = stream::iter(requests.into_iter().enumerate())
            .map(|(idx, req)| async move { (idx, self.process_one(req).await) })
            .buffer_unordered(limit)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    async fn process_one(&self, req: BatchRequest) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::new(req.id);
        result.metrics.item_count = req.items.len();
        result.metrics.estimated_tokens = req.estimated_tokens;
        if req.items.is_empty() {
            return result;
        }

        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut attempts = 0u32;
        let outcome = loop {
            attempts += 1;
            match self.attempt(&req).await {
                Ok(response) => break Ok(response),
                Err(err) if err.retryable() && attempts < max_attempts => {
                    let delay = self
                        .config
                        .retry
                        .delay_for(err.error_type, attempts - 1, err.retry_after);
                    warn!(
                        request_id = %req.id,
                        attempt = attempts,
                        error_type = %err.error_type,
                        delay_ms = delay.as_millis() as u64,
                        "batch attempt failed, retrying: {}",
                        err.message
                    );
                    if let (ErrorType::RateLimit, Some(limiter)) = (err.error_type, &self.api_limiter) {
                        limiter.pause_for(delay).await;
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(err) => break Err(err),
            }
        };
        result.metrics.attempts = attempts;

        match outcome {
            Ok(response) => self.collect_response(&req, response, &mut result),
            Err(err) => {
                warn!(
                    request_id = %req.id,
                    attempts,
                    items = req.items.len(),
                    error_type = %err.error_type,
                    retryable = err.retryable(),
                    "batch failed: {}",
                    err.message
                );
                let batch_size = req.items.len();
                for item in req.items {
                    result.add_failure(BatchFailure::batch_level(
                        item,
                        err.error_type,
                        err.message.clone(),
                        batch_size,
                    ));
                }
            }
        }

        result.metrics.success_count = result.success_count();
        result.metrics.failure_count = result.failure_count();
        result.metrics.elapsed = start.elapsed();
        info!(
            request_id = %req.id,
            successes = result.metrics.success_count,
            failures = result.metrics.failure_count,
            attempts,
            elapsed_ms = result.metrics.elapsed.as_millis() as u64,
            "batch resolved"
        );
        result
    }

    async fn attempt(&self, req: &BatchRequest) -> std::result::Result<SummaryResponse, DispatchError> {
        if let Some(limiter) = &self.api_limiter {
            limiter
                .acquire()
                .await
                .map_err(|e| DispatchError::new(ErrorType::RateLimit, e.to_string()))?;
        }

        // A panicking summarizer fails its own batch, never its siblings.
        let call = AssertUnwindSafe(self.summarizer.summarize(&req.items)).catch_unwind();
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(r)) => r,
            Ok(Err(payload)) => Err(DispatchError::new(
                ErrorType::Unknown,
                format!("summarizer panicked: {}", panic_message(payload.as_ref())),
            )),
            Err(_) => Err(DispatchError::new(
                ErrorType::Timeout,
                format!("summarization call exceeded {}ms", timeout.as_millis()),
            )),
        }
    }

    fn collect_response(&self, req: &BatchRequest, response: SummaryResponse, result: &mut BatchResult) {
        let batch_size = req.items.len();
        let requested: HashSet<i64> = req.items.iter().map(|i| i.id).collect();
        let unexpected: Vec<i64> = response
            .keys()
            .filter(|id| !requested.contains(id))
            .copied()
            .collect();
        if !unexpected.is_empty() {
            warn!(request_id = %req.id, ids = ?unexpected, "response contains ids that were not requested");
        }

        for item in &req.items {
            match response.get(&item.id) {
                Some(ItemOutcome::Summary(summary)) => result.add_success(SummarizedItem {
                    item: item.clone(),
                    summary: summary.clone(),
                }),
                Some(ItemOutcome::Error(e)) => result.add_failure(BatchFailure::item_level(
                    item.clone(),
                    e.error_type(),
                    e.message.clone(),
                    batch_size,
                )),
                None => result.add_failure(BatchFailure::item_level(
                    item.clone(),
                    ErrorType::ApiError,
                    "item missing from provider response",
                    batch_size,
                )),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
