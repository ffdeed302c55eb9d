//! 派发失败分类：定义封闭的错误类型集合及其重试语义。
//!
//! Dispatch failure classification.
//!
//! Every failure the orchestrator records carries exactly one [`ErrorType`].
//! Provider-specific shapes (HTTP status, provider error codes, finish
//! reasons, free-form messages) are mapped into it at the API-client boundary
//! with the `from_*` helpers below, so the orchestrator itself stays
//! provider-agnostic.
//!
//! | Type              | Retryable | Typical origin                         |
//! |-------------------|-----------|----------------------------------------|
//! | `ApiError`        | yes       | 5xx, missing ids in a partial response |
//! | `Timeout`         | yes       | per-call deadline, 408/504             |
//! | `RateLimit`       | yes       | 429, local limiter permit timeout      |
//! | `ValidationError` | yes       | 400/413/422 malformed batch            |
//! | `ContentError`    | no        | item content rejected by the provider  |
//! | `SafetyBlocked`   | no        | provider safety filter                 |
//! | `LengthLimit`     | no        | response truncated by output ceiling   |
//! | `Unknown`         | no        | unclassified                           |
//!
//! ## Example
//!
//! ```rust
//! use ai_batch_pipeline::error_code::ErrorType;
//!
//! let ty = ErrorType::from_http_status(429);
//! assert_eq!(ty, ErrorType::RateLimit);
//! assert!(ty.retryable());
//! assert_eq!(ty.as_str(), "RATE_LIMIT");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure classes for a summarization dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ApiError,
    Timeout,
    RateLimit,
    ValidationError,
    ContentError,
    SafetyBlocked,
    LengthLimit,
    Unknown,
}

impl ErrorType {
    /// Returns the persisted name (e.g., `"RATE_LIMIT"`).
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiError => "API_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ContentError => "CONTENT_ERROR",
            Self::SafetyBlocked => "SAFETY_BLOCKED",
            Self::LengthLimit => "LENGTH_LIMIT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns whether a failure of this class is worth retrying later.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiError | Self::Timeout | Self::RateLimit | Self::ValidationError
        )
    }

    /// Parses a persisted name back into an `ErrorType`. Unrecognized names map to `Unknown`.
    pub fn parse(name: &str) -> Self {
        match name {
            "API_ERROR" => Self::ApiError,
            "TIMEOUT" => Self::Timeout,
            "RATE_LIMIT" => Self::RateLimit,
            "VALIDATION_ERROR" => Self::ValidationError,
            "CONTENT_ERROR" => Self::ContentError,
            "SAFETY_BLOCKED" => Self::SafetyBlocked,
            "LENGTH_LIMIT" => Self::LengthLimit,
            _ => Self::Unknown,
        }
    }

    /// Maps an HTTP status code to the most likely `ErrorType`.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            408 | 504 => Self::Timeout,
            400 | 413 | 422 => Self::ValidationError,
            500..=599 => Self::ApiError,
            _ => Self::Unknown,
        }
    }

    /// Maps a provider error code/type string.
    ///
    /// Supports the common aliases used by OpenAI, Anthropic and Gemini style APIs.
    pub fn from_provider_code(code: &str) -> Option<Self> {
        let ty = match code.to_ascii_lowercase().as_str() {
            "rate_limited" | "rate_limit_exceeded" | "rate_limit_error" | "resource_exhausted" => {
                Self::RateLimit
            }
            "timeout" | "deadline_exceeded" | "request_timeout" => Self::Timeout,
            "invalid_request" | "invalid_request_error" | "invalid_argument"
            | "request_too_large" => Self::ValidationError,
            "content_filter" | "safety" | "blocked" | "prohibited_content" => Self::SafetyBlocked,
            "context_length_exceeded" | "max_tokens" | "length" => Self::LengthLimit,
            "invalid_content" | "unsupported_content" | "content_error" => Self::ContentError,
            "server_error" | "api_error" | "overloaded" | "overloaded_error" | "internal"
            | "unavailable" => Self::ApiError,
            _ => return None,
        };
        Some(ty)
    }

    /// Maps a completion finish reason. Only abnormal reasons produce a value.
    pub fn from_finish_reason(reason: &str) -> Option<Self> {
        match reason.to_ascii_lowercase().as_str() {
            "length" | "max_tokens" | "max_output_tokens" => Some(Self::LengthLimit),
            "content_filter" | "safety" | "recitation" | "blocklist" => Some(Self::SafetyBlocked),
            _ => None,
        }
    }

    /// Best-effort classification of a free-form error message.
    pub fn classify_message(message: &str) -> Self {
        static PATTERNS: Lazy<Vec<(Regex, ErrorType)>> = Lazy::new(|| {
            [
                (r"(?i)\b429\b|rate.?limit|too many requests|quota", ErrorType::RateLimit),
                (r"(?i)timed?.?out|deadline", ErrorType::Timeout),
                (r"(?i)safety|content.?filter|blocked", ErrorType::SafetyBlocked),
                (r"(?i)finish.?reason.*(length|max.?tokens)|truncated|too long", ErrorType::LengthLimit),
                (r"(?i)invalid|malformed|validation|\b4(00|13|22)\b", ErrorType::ValidationError),
                (r"(?i)\b5\d\d\b|server error|unavailable|overloaded", ErrorType::ApiError),
            ]
            .into_iter()
            .filter_map(|(pattern, ty)| Regex::new(pattern).ok().map(|re| (re, ty)))
            .collect()
        });

        PATTERNS
            .iter()
            .find(|(re, _)| re.is_match(message))
            .map(|(_, ty)| *ty)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorType; 8] = [
        ErrorType::ApiError,
        ErrorType::Timeout,
        ErrorType::RateLimit,
        ErrorType::ValidationError,
        ErrorType::ContentError,
        ErrorType::SafetyBlocked,
        ErrorType::LengthLimit,
        ErrorType::Unknown,
    ];

    #[test]
    fn test_retryable_split() {
        let retryable: Vec<_> = ALL.iter().filter(|t| t.retryable()).collect();
        assert_eq!(
            retryable,
            vec![
                &ErrorType::ApiError,
                &ErrorType::Timeout,
                &ErrorType::RateLimit,
                &ErrorType::ValidationError
            ]
        );
        assert!(!ErrorType::ContentError.retryable());
        assert!(!ErrorType::SafetyBlocked.retryable());
        assert!(!ErrorType::LengthLimit.retryable());
    }

    #[test]
    fn test_names_parse_back() {
        for ty in ALL {
            assert_eq!(ErrorType::parse(ty.as_str()), ty);
        }
        assert_eq!(ErrorType::parse("something_else"), ErrorType::Unknown);
    }

    #[test]
    fn test_serde_uses_persisted_names() {
        let json = serde_json::to_string(&ErrorType::SafetyBlocked).unwrap();
        assert_eq!(json, "\"SAFETY_BLOCKED\"");
        let back: ErrorType = serde_json::from_str("\"LENGTH_LIMIT\"").unwrap();
        assert_eq!(back, ErrorType::LengthLimit);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorType::from_http_status(429), ErrorType::RateLimit);
        assert_eq!(ErrorType::from_http_status(504), ErrorType::Timeout);
        assert_eq!(ErrorType::from_http_status(400), ErrorType::ValidationError);
        assert_eq!(ErrorType::from_http_status(502), ErrorType::ApiError);
        assert_eq!(ErrorType::from_http_status(404), ErrorType::Unknown);
    }

    #[test]
    fn test_provider_codes_and_finish_reasons() {
        assert_eq!(
            ErrorType::from_provider_code("rate_limit_exceeded"),
            Some(ErrorType::RateLimit)
        );
        assert_eq!(
            ErrorType::from_provider_code("CONTENT_FILTER"),
            Some(ErrorType::SafetyBlocked)
        );
        assert_eq!(ErrorType::from_provider_code("weird"), None);
        assert_eq!(
            ErrorType::from_finish_reason("length"),
            Some(ErrorType::LengthLimit)
        );
        assert_eq!(ErrorType::from_finish_reason("stop"), None);
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            ErrorType::classify_message("HTTP 429 Too Many Requests"),
            ErrorType::RateLimit
        );
        assert_eq!(
            ErrorType::classify_message("read timed out after 30s"),
            ErrorType::Timeout
        );
        assert_eq!(
            ErrorType::classify_message("response blocked by safety settings"),
            ErrorType::SafetyBlocked
        );
        assert_eq!(
            ErrorType::classify_message("Malformed JSON in request body"),
            ErrorType::ValidationError
        );
        assert_eq!(
            ErrorType::classify_message("503 Service Unavailable"),
            ErrorType::ApiError
        );
        assert_eq!(ErrorType::classify_message("boom"), ErrorType::Unknown);
    }
}
