//! The summary job: pager, builder, orchestrator, writer, retry queue.

use super::writer::ItemWriter;
use crate::batch::{BatchFailure, BatchRequest, DynamicBatchBuilder};
use crate::config::PipelineConfig;
use crate::orchestrator::{BatchOrchestrator, Summarizer};
use crate::resilience::DomainRateLimiterManager;
use crate::retry::{
    map_failures_to_items, map_successes_to_items, MemoryRetryQueueStore, RetryQueue,
    RetryQueueStore,
};
use crate::source::{CheckpointStore, CursorPager, ItemSource, MemoryCheckpointStore};
use crate::tokens::{CharacterEstimator, TokenCounter};
use crate::types::{Item, SummarizedItem};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counters for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub pages: usize,
    pub items_read: usize,
    pub batches: usize,
    pub truncated_items: usize,
    pub summarized: usize,
    pub failed: usize,
    pub enqueued_for_retry: usize,
    pub elapsed: Duration,
}

/// Builder for [`SummaryJob`].
///
/// The item source, summarizer and writer are required. Checkpoints and the
/// retry queue default to in-memory stores.
pub struct SummaryJobBuilder {
    config: PipelineConfig,
    source: Option<Arc<dyn ItemSource>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    writer: Option<Arc<dyn ItemWriter>>,
    retry_store: Option<Arc<dyn RetryQueueStore>>,
    counter: Option<Arc<dyn TokenCounter>>,
    rate_limiter: Option<(Arc<DomainRateLimiterManager>, String)>,
}

impl SummaryJobBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            checkpoints: None,
            summarizer: None,
            writer: None,
            retry_store: None,
            counter: None,
            rate_limiter: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn ItemSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn ItemWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn retry_store(mut self, store: Arc<dyn RetryQueueStore>) -> Self {
        self.retry_store = Some(store);
        self
    }

    /// Replace the character estimator derived from `batch.tokens_per_char`.
    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Draw a permit from `manager`'s limiter for `endpoint` before every summarize call.
    pub fn rate_limiter(mut self, manager: Arc<DomainRateLimiterManager>, endpoint: impl Into<String>) -> Self {
        self.rate_limiter = Some((manager, endpoint.into()));
        self
    }

    pub fn build(self) -> Result<SummaryJob> {
        self.config.validate()?;

        let source = self.source.ok_or_else(|| missing("source"))?;
        let summarizer = self.summarizer.ok_or_else(|| missing("summarizer"))?;
        let writer = self.writer.ok_or_else(|| missing("writer"))?;
        let checkpoints = self
            .checkpoints
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));
        let retry_store = self
            .retry_store
            .unwrap_or_else(|| Arc::new(MemoryRetryQueueStore::new()));
        let counter = self.counter.unwrap_or_else(|| {
            Arc::new(CharacterEstimator::from_tokens_per_char(
                self.config.batch.tokens_per_char,
            ))
        });

        let mut orchestrator = BatchOrchestrator::new(summarizer, self.config.dispatch.clone());
        if let Some((manager, endpoint)) = &self.rate_limiter {
            orchestrator = orchestrator.with_rate_limiter(manager, endpoint)?;
        }

        Ok(SummaryJob {
            pager: CursorPager::new(
                self.config.name.clone(),
                source,
                checkpoints,
                self.config.reader.clone(),
            ),
            builder: DynamicBatchBuilder::with_counter(self.config.batch.clone(), counter),
            orchestrator,
            writer,
            retry_queue: RetryQueue::new(retry_store, self.config.retry_queue.clone()),
            config: self.config,
        })
    }
}

fn missing(what: &str) -> Error {
    Error::configuration_with_context(
        format!("summary job requires a {}", what),
        ErrorContext::new()
            .with_field_path(what)
            .with_source("summary_job_builder"),
    )
}

/// One resumable pass over the unsummarized items of a source.
///
/// The checkpoint advances only after every batch of a page has been
/// resolved and written; a run that fails midway resumes at the last
/// completed page.
pub struct SummaryJob {
    config: PipelineConfig,
    pager: CursorPager,
    builder: DynamicBatchBuilder,
    orchestrator: BatchOrchestrator,
    writer: Arc<dyn ItemWriter>,
    retry_queue: RetryQueue,
}

impl SummaryJob {
    pub fn builder(config: PipelineConfig) -> SummaryJobBuilder {
        SummaryJobBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry_queue
    }

    pub async fn run(&mut self) -> Result<JobReport> {
        let start = Instant::now();
        let mut report = JobReport::default();

        self.pager.open().await?;
        info!(job = %self.config.name, "summary job started");

        while let Some(page) = self.pager.read().await? {
            report.pages += 1;
            report.items_read += page.len();
            self.process_page(page, &mut report).await?;
            self.pager.update().await?;
        }

        // the checkpoint stays: the next run continues after it
        self.pager.close();

        report.elapsed = start.elapsed();
        info!(
            job = %self.config.name,
            pages = report.pages,
            items = report.items_read,
            batches = report.batches,
            summarized = report.summarized,
            failed = report.failed,
            enqueued = report.enqueued_for_retry,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "summary job finished"
        );
        Ok(report)
    }

    async fn process_page(&self, page: Vec<Item>, report: &mut JobReport) -> Result<()> {
        let batches = self.builder.build(page.clone());
        report.batches += batches.len();
        report.truncated_items += batches.iter().filter(|b| b.truncated).count();

        let requests: Vec<BatchRequest> = batches.into_iter().map(BatchRequest::from).collect();
        let results = self.orchestrator.process_batches(requests).await;

        let mut successes: Vec<SummarizedItem> = Vec::new();
        let mut failures: Vec<BatchFailure> = Vec::new();
        for r in results {
            successes.extend(r.successes);
            failures.extend(r.failures);
        }
        debug!(
            items = page.len(),
            successes = successes.len(),
            failures = failures.len(),
            "page dispatched"
        );

        let successes = map_successes_to_items(&page, successes);
        if !successes.is_empty() {
            self.writer.write_summaries(&successes).await?;
            self.retry_queue
                .record_successes(successes.iter().map(|s| s.item.id))
                .await?;
        }

        let failed_items = map_failures_to_items(&page, &successes, &failures);
        if !failed_items.is_empty() {
            self.writer.write_failures(&failed_items).await?;
        }
        if !failures.is_empty() {
            let queued = self.retry_queue.record_failures(&failures).await?;
            report.enqueued_for_retry += queued.enqueued + queued.rescheduled;
        }

        report.summarized += successes.len();
        report.failed += failed_items.len();
        Ok(())
    }
}
