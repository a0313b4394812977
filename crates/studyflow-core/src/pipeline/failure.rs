//! Translation of step failures into the user-facing [`PipelineError`].

use thiserror::Error;

use super::types::PipelineError;
use crate::error::{AiError, ExtractError};

/// Failure of one pipeline step. Never leaves the pipeline.
#[derive(Error, Debug)]
pub(crate) enum StepError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Ai(#[from] AiError),

    /// Generation succeeded but produced nothing usable
    #[error("The AI returned no valid lessons")]
    NoLessons,

    /// Nothing left after normalization, so not even safe mode can help
    #[error("The PDF contains no extractable text")]
    EmptyText,

    #[error("Failed to save session: {0:#}")]
    Storage(anyhow::Error),

    #[error("Run cancelled")]
    Cancelled,

    /// A newer run took over
    #[error("Run superseded")]
    Superseded,
}

impl StepError {
    pub(crate) fn is_cancelled(&self) -> bool {
        match self {
            StepError::Extract(e) => e.is_aborted(),
            StepError::Ai(e) => e.is_cancelled(),
            StepError::Cancelled => true,
            _ => false,
        }
    }

    /// Failures eligible for the automatic safe-mode fallback: any AI error
    /// except an empty lesson list.
    pub(crate) fn is_ai_failure(&self) -> bool {
        matches!(self, StepError::Ai(_))
    }
}

const MSG_TIMEOUT: &str = "The operation took too long. You can retry or use safe mode.";
const MSG_AUTH: &str = "The AI key or its permissions are not valid.";
const MSG_QUOTA: &str = "Temporary quota exhausted. Retry in a few minutes.";
const MSG_NOT_FOUND: &str = "The AI API endpoint is unavailable.";
const MSG_INVALID: &str = "The AI returned an incomplete or invalid response.";
const MSG_PDF: &str = "Could not read the PDF.";
const MSG_STORAGE: &str = "Could not save the study session.";
const MSG_EMPTY: &str = "The PDF contains no extractable text.";

/// Map an ingestion failure. `has_text` tells whether extracted text is
/// available, which is what safe mode needs.
pub(crate) fn ingest_error(err: &StepError, has_text: bool) -> PipelineError {
    if let StepError::EmptyText = err {
        return PipelineError {
            message: MSG_EMPTY.to_string(),
            retryable: false,
            safe_mode: false,
        };
    }
    let (message, safe_mode) = match err {
        StepError::Extract(ExtractError::Timeout) | StepError::Ai(AiError::Timeout) => {
            (MSG_TIMEOUT, has_text)
        }
        StepError::Ai(AiError::Auth(_)) => (MSG_AUTH, false),
        StepError::Ai(AiError::Quota(_)) => (MSG_QUOTA, has_text),
        StepError::Ai(AiError::NotFound(_)) => (MSG_NOT_FOUND, has_text),
        StepError::Extract(_) => (MSG_PDF, false),
        StepError::Storage(_) => (MSG_STORAGE, has_text),
        _ => (MSG_INVALID, has_text),
    };
    PipelineError {
        message: message.to_string(),
        retryable: true,
        safe_mode,
    }
}

/// Map a generation-only failure: retryable, never safe mode since the
/// session already is one.
pub(crate) fn generation_error(err: &StepError) -> PipelineError {
    PipelineError {
        safe_mode: false,
        ..ingest_error(err, false)
    }
}
