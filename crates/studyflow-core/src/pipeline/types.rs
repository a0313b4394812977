//! Pipeline phases, events and outcomes.

use serde::{Deserialize, Serialize};

use crate::ai::types::GenerationProgress;
use crate::pdf::SourceDocument;
use crate::session::{Course, SessionStatus, StudyMethod, StudySession};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Starting,
    Parsing,
    Validating,
    Chunking,
    #[serde(rename = "callingLLM")]
    CallingLlm,
    CreatingSession,
    Done,
    Error,
    Cancelled,
}

impl PipelinePhase {
    fn rank(self) -> u8 {
        match self {
            PipelinePhase::Starting => 0,
            PipelinePhase::Parsing => 1,
            PipelinePhase::Validating => 2,
            PipelinePhase::Chunking => 3,
            PipelinePhase::CallingLlm => 4,
            PipelinePhase::CreatingSession => 5,
            PipelinePhase::Done => 6,
            PipelinePhase::Error | PipelinePhase::Cancelled => 7,
        }
    }

    /// Done, error and cancelled end a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelinePhase::Done | PipelinePhase::Error | PipelinePhase::Cancelled
        )
    }

    /// Phases only move forward; branches may skip ahead. Any live phase
    /// can fail or be cancelled. Terminal phases are absorbing until a new
    /// run starts.
    pub fn can_transition_to(self, next: PipelinePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            PipelinePhase::Error | PipelinePhase::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Starting => write!(f, "starting"),
            PipelinePhase::Parsing => write!(f, "parsing"),
            PipelinePhase::Validating => write!(f, "validating"),
            PipelinePhase::Chunking => write!(f, "chunking"),
            PipelinePhase::CallingLlm => write!(f, "callingLLM"),
            PipelinePhase::CreatingSession => write!(f, "creating_session"),
            PipelinePhase::Done => write!(f, "done"),
            PipelinePhase::Error => write!(f, "error"),
            PipelinePhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a run and the recovery actions it allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineError {
    pub message: String,
    pub retryable: bool,
    pub safe_mode: bool,
}

/// Advisory findings about the extracted text, resolved by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Likely a scanned or image-only PDF
    ShortText { chars: usize },
    Encrypted,
    TooManyPages { pages: usize },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::ShortText { chars } => write!(
                f,
                "The PDF looks like an image or contains very little text ({} characters).",
                chars
            ),
            ValidationWarning::Encrypted => write!(
                f,
                "The PDF is encrypted. The extracted text may be wrong."
            ),
            ValidationWarning::TooManyPages { pages } => write!(
                f,
                "The PDF has {} pages, which may take a long time to process.",
                pages
            ),
        }
    }
}

/// Events delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Phase(PipelinePhase),
    /// Timestamped log line
    Log(String),
    Progress(GenerationProgress),
    Failed(PipelineError),
    SessionCreated {
        session_id: String,
        status: SessionStatus,
    },
}

/// Receives pipeline events of the current run.
///
/// Called synchronously from the pipeline task; implementations must not
/// block.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: PipelineEvent);
}

/// No-op implementation for testing
pub struct NoOpObserver;

impl PipelineObserver for NoOpObserver {
    fn on_event(&self, _event: PipelineEvent) {}
}

impl PipelineObserver for tokio::sync::mpsc::UnboundedSender<PipelineEvent> {
    fn on_event(&self, event: PipelineEvent) {
        let _ = self.send(event);
    }
}

/// Everything needed to ingest one PDF.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub source: SourceDocument,
    pub method: StudyMethod,
    pub course: Course,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Keep logs and reuse text extracted by the previous attempt
    pub is_retry: bool,
    /// Skip validation and AI, producing a pending-generation session
    pub use_safe_mode: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A session with lessons was saved
    Completed(StudySession),
    /// A pending-generation session was saved
    SafeMode(StudySession),
    Failed(PipelineError),
    Cancelled,
    /// A newer run started before this one finished; nothing was applied
    Superseded,
    /// Nothing to retry
    Idle,
}

/// Point-in-time view of the pipeline state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSnapshot {
    pub run_id: u64,
    pub request_id: String,
    pub phase: Option<PipelinePhase>,
    pub logs: Vec<String>,
    pub progress: Option<GenerationProgress>,
    pub error: Option<PipelineError>,
    /// Text from a previous parse is available for retries
    pub has_text: bool,
}
