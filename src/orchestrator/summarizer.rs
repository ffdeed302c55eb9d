//! Summarization client boundary.

use crate::error_code::ErrorType;
use crate::types::{Item, Summary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Per-item outcome reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Summary(Summary),
    Error(ProviderItemError),
}

/// A provider-side rejection of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderItemError {
    pub message: String,
    /// Provider error code or finish reason, when the provider reports one.
    pub code: Option<String>,
}

impl ProviderItemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn error_type(&self) -> ErrorType {
        self.code
            .as_deref()
            .and_then(|c| ErrorType::from_finish_reason(c).or_else(|| ErrorType::from_provider_code(c)))
            .unwrap_or_else(|| ErrorType::classify_message(&self.message))
    }
}

/// Response keyed by item id. Ids absent from the map are item-level failures.
pub type SummaryResponse = HashMap<i64, ItemOutcome>;

/// A whole-call failure, already classified at the client boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub error_type: ErrorType,
    pub message: String,
    /// Server-requested backoff (e.g. `Retry-After`).
    pub retry_after: Option<Duration>,
}

impl DispatchError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorType::from_http_status(status), message)
    }

    /// Classify a transport or client error by its message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorType::classify_message(&message), message)
    }

    pub fn with_retry_after(mut self, d: Duration) -> Self {
        self.retry_after = Some(d);
        self
    }

    pub fn retryable(&self) -> bool {
        self.error_type.retryable()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for DispatchError {}

/// External summarization API.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, items: &[Item]) -> std::result::Result<SummaryResponse, DispatchError>;
}
