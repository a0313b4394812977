//! Error types shared by the extractor, the AI providers and the pipeline.
//!
//! Library code never surfaces these to the presentation layer directly:
//! the pipeline translates them into a [`crate::pipeline::PipelineError`].

use thiserror::Error;

use crate::retry::TimedOut;

/// Failure while turning a PDF into text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The run was cancelled before or during extraction.
    #[error("PDF extraction aborted")]
    Aborted,

    /// Extraction did not finish within its budget.
    #[error("timeout")]
    Timeout,

    /// The file could not be read or parsed.
    #[error("Failed to read PDF: {0}")]
    Io(String),
}

impl ExtractError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<TimedOut> for ExtractError {
    fn from(_: TimedOut) -> Self {
        Self::Timeout
    }
}

/// Failure reported by an AI provider, classified so the pipeline can pick
/// a user message and a recovery policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// 401/403: the key is missing, wrong or lacks permissions.
    #[error("AI authentication failed: {0}")]
    Auth(String),

    /// 429: rate limit or quota exhausted.
    #[error("AI quota exceeded: {0}")]
    Quota(String),

    /// 404: model or endpoint does not exist.
    #[error("AI endpoint not found: {0}")]
    NotFound(String),

    /// The call exceeded its time budget.
    #[error("timeout")]
    Timeout,

    /// Empty output, or output that does not match the expected schema.
    #[error("Malformed AI response: {0}")]
    Malformed(String),

    /// The run was cancelled while the call was in flight.
    #[error("AI request cancelled")]
    Cancelled,

    /// Any other transport or provider failure.
    #[error("AI request failed: {0}")]
    Request(String),
}

impl AiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classify a failure from its HTTP status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::Quota(message),
            404 => Self::NotFound(message),
            _ => Self::Request(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Classify a failure from an SDK error message when no status code is
    /// exposed. Matches status codes and the error codes providers embed.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("invalid_api_key")
            || lower.contains("incorrect api key")
            || lower.contains("permission")
        {
            Self::Auth(message)
        } else if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("insufficient_quota")
        {
            Self::Quota(message)
        } else if lower.contains("404") || lower.contains("model_not_found") {
            Self::NotFound(message)
        } else {
            Self::Request(message)
        }
    }
}

impl From<TimedOut> for AiError {
    fn from(_: TimedOut) -> Self {
        Self::Timeout
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::Request(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
