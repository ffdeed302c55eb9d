use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "batch.max_batch_size")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "cursor_pager", "config_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the batch pipeline.
///
/// Dispatch failures against the summarization API never surface here: the
/// orchestrator turns them into [`crate::batch::BatchFailure`] values. This
/// type covers everything that aborts a unit of work instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// The upstream item source failed; fatal for the current run.
    #[error("Item source error: {message}{}", format_context(.context))]
    Source {
        message: String,
        context: ErrorContext,
    },

    #[error("Checkpoint error: {message}{}", format_context(.context))]
    Checkpoint {
        message: String,
        context: ErrorContext,
    },

    /// Downstream persistence (item writer, retry queue store) failed.
    #[error("Storage error: {message}{}", format_context(.context))]
    Storage {
        message: String,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded for {host}: no permit within {waited:?}")]
    RateLimitExceeded { host: String, waited: Duration },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn source_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Source {
            message: msg.into(),
            context,
        }
    }

    pub fn checkpoint_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Checkpoint {
            message: msg.into(),
            context,
        }
    }

    pub fn storage_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Storage {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Source { context, .. }
            | Error::Checkpoint { context, .. }
            | Error::Storage { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether this error is a rate-limit permit timeout.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimitExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_formatting() {
        let err = Error::configuration_with_context(
            "max_batch_size must be positive",
            ErrorContext::new()
                .with_field_path("batch.max_batch_size")
                .with_source("config_loader"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: max_batch_size must be positive (field: batch.max_batch_size, source: config_loader)"
        );
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("batch.max_batch_size")
        );
    }

    #[test]
    fn test_rate_limit_error_has_no_context() {
        let err = Error::RateLimitExceeded {
            host: "example.com".into(),
            waited: Duration::from_secs(5),
        };
        assert!(err.is_rate_limited());
        assert!(err.context().is_none());
        assert!(err.to_string().contains("example.com"));
    }
}
