//! End-to-end pipeline scenarios with scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::ai::prompts::{JsonRequest, RequestKind};
use crate::ai::{AcademicCategory, AcademicContext, MockProvider, StudyProvider};
use crate::error::{AiError, ExtractError};
use crate::pdf::{create_multipage_pdf, ExtractedDocument, SourceDocument};
use crate::session::{Course, SessionStatus, StudyMethod};
use crate::storage::JsonSessionStore;

/// What the next classify call does; calls past the script succeed.
enum Step {
    Fail(AiError),
    Hang,
}

struct ScriptedProvider {
    classify_script: Mutex<VecDeque<Step>>,
    classify_calls: AtomicUsize,
    lesson_calls: AtomicUsize,
    lessons_per_call: usize,
}

impl ScriptedProvider {
    fn new(lessons_per_call: usize) -> Self {
        Self {
            classify_script: Mutex::new(VecDeque::new()),
            classify_calls: AtomicUsize::new(0),
            lesson_calls: AtomicUsize::new(0),
            lessons_per_call,
        }
    }

    fn then(self, step: Step) -> Self {
        self.classify_script.lock().unwrap().push_back(step);
        self
    }

    fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

fn lessons_json(count: usize) -> String {
    let lessons: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "title": format!("Lesson {}", i + 1),
                "content": "Cells divide by mitosis.",
                "keyPoints": ["mitosis"],
                "checkQuestion": {
                    "question": "How do cells divide?",
                    "idealAnswer": "By mitosis.",
                    "concepts": [{"idea": "mitosis", "weight": 0.6}]
                }
            })
        })
        .collect();
    json!({ "lessons": lessons }).to_string()
}

#[async_trait]
impl StudyProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: &JsonRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        match request.kind {
            RequestKind::Classify => {
                self.classify_calls.fetch_add(1, Ordering::SeqCst);
                let step = self.classify_script.lock().unwrap().pop_front();
                match step {
                    Some(Step::Fail(err)) => Err(err),
                    Some(Step::Hang) => {
                        cancel.cancelled().await;
                        Err(AiError::Cancelled)
                    }
                    None => Ok(r#"{"category": "technical", "keywords": ["cells"]}"#.to_string()),
                }
            }
            RequestKind::Title => Ok(r#"{"title": "Cell Biology"}"#.to_string()),
            RequestKind::Lessons => {
                self.lesson_calls.fetch_add(1, Ordering::SeqCst);
                Ok(lessons_json(self.lessons_per_call))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

struct ScriptedParser {
    doc: ExtractedDocument,
    calls: AtomicUsize,
    /// The first call blocks until its run is cancelled
    hang_first: bool,
}

impl ScriptedParser {
    fn with_text(text: &str) -> Self {
        Self {
            doc: ExtractedDocument {
                text: text.to_string(),
                page_count: 3,
                encrypted: false,
            },
            calls: AtomicUsize::new(0),
            hang_first: false,
        }
    }

    fn hanging_first(mut self) -> Self {
        self.hang_first = true;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfParser for ScriptedParser {
    async fn extract(
        &self,
        _source: &SourceDocument,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_first && call == 0 {
            cancel.cancelled().await;
            return Err(ExtractError::Aborted);
        }
        Ok(self.doc.clone())
    }
}

fn long_text() -> String {
    "Cells are the basic unit of life.  \n\n\n\n   They divide by mitosis. ".repeat(10)
}

fn request() -> IngestRequest {
    IngestRequest {
        source: SourceDocument::from_bytes("cells.pdf", Vec::new()),
        method: StudyMethod::Pomodoro,
        course: Course::named("local", "Biology"),
    }
}

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        retry_delays_ms: Vec::new(),
        ..PipelineSettings::default()
    }
}

struct Harness {
    pipeline: StudyPipeline,
    store: Arc<JsonSessionStore>,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    _dir: TempDir,
}

fn harness(
    parser: Arc<ScriptedParser>,
    provider: Arc<ScriptedProvider>,
    settings: PipelineSettings,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonSessionStore::new(dir.path().join("sessions")));
    let (tx, events) = mpsc::unbounded_channel();
    let pipeline = StudyPipeline::new(StudyAi::new(provider), store.clone())
        .with_parser(parser)
        .with_observer(Arc::new(tx))
        .with_settings(settings);
    Harness {
        pipeline,
        store,
        events,
        _dir: dir,
    }
}

fn drain_phases(events: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelinePhase> {
    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::Phase(phase) = event {
            phases.push(phase);
        }
    }
    phases
}

async fn wait_for_phase(
    events: &mut mpsc::UnboundedReceiver<PipelineEvent>,
    wanted: PipelinePhase,
) {
    while let Some(event) = events.recv().await {
        if event == PipelineEvent::Phase(wanted) {
            return;
        }
    }
    panic!("pipeline never entered {}", wanted);
}

#[tokio::test]
async fn test_happy_path_creates_paused_session() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(3));
    let mut h = harness(parser, provider, fast_settings());

    let outcome = h.pipeline.run(request(), RunOptions::default()).await;

    let RunOutcome::Completed(session) = outcome else {
        panic!("expected a completed session, got {:?}", outcome);
    };
    assert_eq!(session.status, SessionStatus::Paused);
    assert_eq!(session.title, "Cell Biology");
    assert_eq!(session.micro_lessons.len(), 3);
    assert_eq!(
        session.academic_context.as_ref().map(|c| c.category),
        Some(AcademicCategory::Technical)
    );
    // Normalized before it reaches the session
    assert!(!session.study_text.contains("\n\n\n"));

    assert_eq!(
        drain_phases(&mut h.events),
        vec![
            PipelinePhase::Starting,
            PipelinePhase::Parsing,
            PipelinePhase::Validating,
            PipelinePhase::CallingLlm,
            PipelinePhase::CreatingSession,
            PipelinePhase::Done,
        ]
    );

    let snapshot = h.pipeline.snapshot();
    assert_eq!(snapshot.phase, Some(PipelinePhase::Done));
    assert_eq!(
        snapshot.progress,
        Some(crate::ai::GenerationProgress { done: 1, total: 1 })
    );
    assert!(snapshot
        .logs
        .iter()
        .any(|l| l.ends_with("Entering phase: callingLLM")));

    let saved = h.store.load_session(&session.id).await.unwrap();
    assert_eq!(saved, session);
}

#[tokio::test]
async fn test_short_text_suspends_on_image_warning() {
    let parser = Arc::new(ScriptedParser::with_text("Scanned page."));
    let provider = Arc::new(ScriptedProvider::new(1));
    let (presenter, mut prompts) = ChannelPresenter::new();
    let h = harness(parser, provider.clone(), fast_settings());
    let pipeline = h.pipeline.clone().with_presenter(Arc::new(presenter));

    let runner = pipeline.clone();
    let run = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });

    let prompt = prompts.recv().await.unwrap();
    assert_eq!(
        prompt.warnings,
        vec![ValidationWarning::ShortText { chars: 13 }]
    );
    assert!(prompt.warnings[0].to_string().contains("image"));
    assert_eq!(pipeline.snapshot().phase, Some(PipelinePhase::Validating));
    assert_eq!(provider.classify_calls(), 0);

    prompt.continue_anyway();
    let outcome = run.await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(provider.classify_calls(), 1);
}

#[tokio::test]
async fn test_warning_safe_mode_choice_skips_ai() {
    let parser = Arc::new(ScriptedParser::with_text("Scanned page."));
    let provider = Arc::new(ScriptedProvider::new(1));
    let (presenter, mut prompts) = ChannelPresenter::new();
    let h = harness(parser, provider.clone(), fast_settings());
    let pipeline = h.pipeline.clone().with_presenter(Arc::new(presenter));

    let runner = pipeline.clone();
    let run = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });
    prompts.recv().await.unwrap().use_safe_mode();

    let RunOutcome::SafeMode(session) = run.await.unwrap() else {
        panic!("expected a safe mode session");
    };
    assert_eq!(session.status, SessionStatus::PendingGeneration);
    assert_eq!(session.study_text, "Scanned page.");
    assert_eq!(provider.classify_calls(), 0);
}

#[tokio::test]
async fn test_ai_failure_falls_back_to_pending_session() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(
        ScriptedProvider::new(3).then(Step::Fail(AiError::Quota("429".to_string()))),
    );
    let mut h = harness(parser, provider, fast_settings());

    let outcome = h.pipeline.run(request(), RunOptions::default()).await;

    let RunOutcome::SafeMode(session) = outcome else {
        panic!("expected safe mode fallback, got {:?}", outcome);
    };
    assert_eq!(session.status, SessionStatus::PendingGeneration);
    assert!(session.title.starts_with("(Safe Mode) "));
    assert!(session.micro_lessons.is_empty());
    assert!(!session.study_text.is_empty());

    let phases = drain_phases(&mut h.events);
    assert!(phases.contains(&PipelinePhase::CallingLlm));
    assert!(!phases.contains(&PipelinePhase::Error));
    assert_eq!(phases.last(), Some(&PipelinePhase::Done));
    assert!(h.pipeline.snapshot().error.is_none());

    let listed = h.store.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SessionStatus::PendingGeneration);
}

#[tokio::test]
async fn test_ai_classify_is_retried_before_failing() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(
        ScriptedProvider::new(2).then(Step::Fail(AiError::Request("reset".to_string()))),
    );
    let settings = PipelineSettings {
        retry_delays_ms: vec![1],
        ..PipelineSettings::default()
    };
    let h = harness(parser, provider.clone(), settings);

    let outcome = h.pipeline.run(request(), RunOptions::default()).await;
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(provider.classify_calls(), 2);
}

#[tokio::test]
async fn test_zero_lessons_is_an_error() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(0));
    let h = harness(parser, provider, fast_settings());

    let outcome = h.pipeline.run(request(), RunOptions::default()).await;

    let RunOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(error.message.contains("incomplete or invalid"));
    assert!(error.retryable);
    assert!(error.safe_mode);

    let snapshot = h.pipeline.snapshot();
    assert_eq!(snapshot.phase, Some(PipelinePhase::Error));
    assert_eq!(snapshot.error, Some(error));
    assert!(h.store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_during_parsing() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()).hanging_first());
    let provider = Arc::new(ScriptedProvider::new(1));
    let mut h = harness(parser, provider, fast_settings());

    let runner = h.pipeline.clone();
    let run = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });

    wait_for_phase(&mut h.events, PipelinePhase::Parsing).await;
    assert!(h.pipeline.cancel());

    assert_eq!(run.await.unwrap(), RunOutcome::Cancelled);
    let snapshot = h.pipeline.snapshot();
    assert_eq!(snapshot.phase, Some(PipelinePhase::Cancelled));
    assert!(snapshot.error.is_none());
    assert!(!drain_phases(&mut h.events).contains(&PipelinePhase::Error));
    assert!(h.store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_during_ai_call() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(1).then(Step::Hang));
    let mut h = harness(parser, provider.clone(), fast_settings());

    let runner = h.pipeline.clone();
    let run = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });

    wait_for_phase(&mut h.events, PipelinePhase::CallingLlm).await;
    assert!(h.pipeline.cancel());

    assert_eq!(run.await.unwrap(), RunOutcome::Cancelled);
    assert_eq!(provider.classify_calls(), 1);
    let snapshot = h.pipeline.snapshot();
    assert_eq!(snapshot.phase, Some(PipelinePhase::Cancelled));
    assert!(snapshot.error.is_none());
    // Cancelling is not an AI failure, so no safe mode session either
    assert!(h.store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_while_warning_prompt_is_open() {
    let parser = Arc::new(ScriptedParser::with_text("tiny"));
    let provider = Arc::new(ScriptedProvider::new(1));
    let (presenter, mut prompts) = ChannelPresenter::new();
    let h = harness(parser, provider, fast_settings());
    let pipeline = h.pipeline.clone().with_presenter(Arc::new(presenter));

    let runner = pipeline.clone();
    let run = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });

    let prompt = prompts.recv().await.unwrap();
    pipeline.cancel();

    assert_eq!(run.await.unwrap(), RunOutcome::Cancelled);
    assert!(prompt.is_abandoned());
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_llm_timeout_skips_parsing() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(2).then(Step::Hang));
    let settings = PipelineSettings {
        auto_safe_mode: false,
        ..fast_settings()
    };
    let mut h = harness(parser.clone(), provider.clone(), settings);

    let outcome = h.pipeline.run(request(), RunOptions::default()).await;
    let RunOutcome::Failed(error) = outcome else {
        panic!("expected timeout failure, got {:?}", outcome);
    };
    assert!(error.message.contains("took too long"));
    assert!(error.safe_mode);
    assert!(h.pipeline.snapshot().has_text);
    drain_phases(&mut h.events);

    let outcome = h.pipeline.retry().await;
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(parser.calls(), 1);
    assert_eq!(provider.classify_calls(), 2);

    let phases = drain_phases(&mut h.events);
    assert!(!phases.contains(&PipelinePhase::Parsing));
    let logs = h.pipeline.snapshot().logs;
    assert!(logs.iter().any(|l| l.contains("Reusing text parsed")));
    // Retry keeps the log of the failed attempt
    assert!(logs.iter().any(|l| l.contains("ERROR:")));
}

#[tokio::test]
async fn test_explicit_safe_mode_still_parses() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(1));
    let mut h = harness(parser.clone(), provider.clone(), fast_settings());

    let outcome = h
        .pipeline
        .run(
            request(),
            RunOptions {
                is_retry: false,
                use_safe_mode: true,
            },
        )
        .await;

    let RunOutcome::SafeMode(session) = outcome else {
        panic!("expected safe mode session, got {:?}", outcome);
    };
    assert_eq!(session.study_text, crate::text::normalize_text(&long_text()));
    assert_eq!(parser.calls(), 1);
    assert_eq!(provider.classify_calls(), 0);
    assert_eq!(
        drain_phases(&mut h.events),
        vec![
            PipelinePhase::Starting,
            PipelinePhase::Parsing,
            PipelinePhase::CreatingSession,
            PipelinePhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_use_safe_mode_after_failure_reuses_text() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(
        ScriptedProvider::new(1).then(Step::Fail(AiError::Auth("401".to_string()))),
    );
    let settings = PipelineSettings {
        auto_safe_mode: false,
        ..fast_settings()
    };
    let h = harness(parser.clone(), provider, settings);

    let RunOutcome::Failed(error) = h.pipeline.run(request(), RunOptions::default()).await else {
        panic!("expected auth failure");
    };
    assert!(!error.safe_mode);

    let outcome = h.pipeline.use_safe_mode().await;
    assert!(matches!(outcome, RunOutcome::SafeMode(_)));
    assert_eq!(parser.calls(), 1);
}

#[tokio::test]
async fn test_resume_with_context_skips_classification() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(2));
    let mut h = harness(parser, provider.clone(), fast_settings());

    let mut pending = StudySession::pending_generation(
        "cells.pdf",
        &Course::named("local", "Biology"),
        StudyMethod::Long,
        "Cells divide by mitosis.".to_string(),
    );
    pending.academic_context = Some(AcademicContext {
        category: AcademicCategory::Memorization,
        keywords: vec![],
    });

    let outcome = h.pipeline.resume(pending.clone()).await;

    let RunOutcome::Completed(session) = outcome else {
        panic!("expected completed session, got {:?}", outcome);
    };
    assert_eq!(provider.classify_calls(), 0);
    assert_eq!(session.id, pending.id);
    assert_eq!(session.title, "cells.pdf");
    assert_eq!(session.status, SessionStatus::Paused);
    assert_eq!(session.micro_lessons.len(), 2);
    assert_eq!(
        session.academic_context.map(|c| c.category),
        Some(AcademicCategory::Memorization)
    );

    assert_eq!(
        drain_phases(&mut h.events),
        vec![
            PipelinePhase::Starting,
            PipelinePhase::CallingLlm,
            PipelinePhase::CreatingSession,
            PipelinePhase::Done,
        ]
    );
    assert_eq!(h.store.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_without_context_classifies_once() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(1));
    let h = harness(parser, provider.clone(), fast_settings());

    let pending = StudySession::pending_generation(
        "cells.pdf",
        &Course::named("local", "Biology"),
        StudyMethod::Pomodoro,
        "Cells divide by mitosis.".to_string(),
    );

    let outcome = h.pipeline.resume(pending).await;
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(provider.classify_calls(), 1);
}

#[tokio::test]
async fn test_resume_zero_lessons_fails_without_safe_mode() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(0));
    let h = harness(parser, provider, fast_settings());

    let pending = StudySession::pending_generation(
        "cells.pdf",
        &Course::named("local", "Biology"),
        StudyMethod::Pomodoro,
        "Cells divide by mitosis.".to_string(),
    );

    let RunOutcome::Failed(error) = h.pipeline.resume(pending).await else {
        panic!("expected failure");
    };
    assert!(error.retryable);
    assert!(!error.safe_mode);
    assert_eq!(h.pipeline.snapshot().phase, Some(PipelinePhase::Error));
}

#[tokio::test]
async fn test_resume_rejects_generated_session() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(1));
    let h = harness(parser, provider, fast_settings());

    let session = StudySession::generated(
        "Done already".to_string(),
        &Course::named("local", "Biology"),
        StudyMethod::Pomodoro,
        "text".to_string(),
        AcademicContext::default(),
        Vec::new(),
    );
    assert!(matches!(
        h.pipeline.resume(session).await,
        RunOutcome::Failed(PipelineError {
            retryable: false,
            ..
        })
    ));
}

#[tokio::test]
async fn test_newer_run_supersedes_older() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()).hanging_first());
    let provider = Arc::new(ScriptedProvider::new(1));
    let mut h = harness(parser, provider, fast_settings());

    let runner = h.pipeline.clone();
    let first = tokio::spawn(async move { runner.run(request(), RunOptions::default()).await });
    wait_for_phase(&mut h.events, PipelinePhase::Parsing).await;

    let second = h.pipeline.run(request(), RunOptions::default()).await;

    assert_eq!(first.await.unwrap(), RunOutcome::Superseded);
    let RunOutcome::Completed(session) = second else {
        panic!("expected the newer run to complete, got {:?}", second);
    };

    let snapshot = h.pipeline.snapshot();
    assert_eq!(snapshot.phase, Some(PipelinePhase::Done));
    assert!(!snapshot
        .logs
        .iter()
        .any(|l| l.contains("cancelled by user")));

    let listed = h.store.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, session.id);
}

#[tokio::test]
async fn test_retry_without_previous_run_is_idle() {
    let parser = Arc::new(ScriptedParser::with_text(&long_text()));
    let provider = Arc::new(ScriptedProvider::new(1));
    let h = harness(parser, provider, fast_settings());

    assert_eq!(h.pipeline.retry().await, RunOutcome::Idle);
    assert_eq!(h.pipeline.use_safe_mode().await, RunOutcome::Idle);
    assert!(!h.pipeline.cancel());
}

#[tokio::test]
async fn test_real_pdf_with_mock_provider() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonSessionStore::new(dir.path()));
    let ai = StudyAi::new(Arc::new(MockProvider::with_delay(Duration::ZERO)));
    let pipeline = StudyPipeline::new(ai, store.clone()).with_settings(fast_settings());

    let sentence = "Photosynthesis turns light into chemical energy";
    let pages: Vec<&str> = std::iter::repeat(sentence).take(6).collect();
    let request = IngestRequest {
        source: SourceDocument::from_bytes("plants.pdf", create_multipage_pdf(&pages)),
        method: StudyMethod::Long,
        course: Course::named("local", "Botany"),
    };

    let outcome = pipeline.run(request, RunOptions::default()).await;

    let RunOutcome::Completed(session) = outcome else {
        panic!("expected completed session, got {:?}", outcome);
    };
    assert_eq!(session.title, crate::ai::provider::mock::MOCK_TITLE);
    assert!(session.study_text.contains("Photosynthesis"));
    assert_eq!(store.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreadable_pdf_reports_without_safe_mode() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonSessionStore::new(dir.path()));
    let ai = StudyAi::new(Arc::new(MockProvider::with_delay(Duration::ZERO)));
    let pipeline = StudyPipeline::new(ai, store).with_settings(fast_settings());

    let request = IngestRequest {
        source: SourceDocument::from_bytes("broken.pdf", b"not a pdf".to_vec()),
        method: StudyMethod::Pomodoro,
        course: Course::named("local", "Botany"),
    };

    let RunOutcome::Failed(error) = pipeline.run(request, RunOptions::default()).await else {
        panic!("expected failure");
    };
    assert!(error.message.contains("Could not read the PDF"));
    assert!(!error.safe_mode);
}
