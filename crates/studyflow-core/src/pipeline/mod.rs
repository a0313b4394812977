//! PDF ingestion and lesson generation pipeline.
//!
//! # Flow
//!
//! ```text
//! run(request)                              resume(session)
//! ────────────                              ───────────────
//! starting                                  starting
//!    │                                         │
//! parsing ◄── skipped on retry with text       │
//!    │                                         │
//!    ├── safe mode requested ──┐               │
//! validating ── warnings? ── user decides      │
//!    │                         │               │
//! chunking (more than one)     │               │
//!    │                         │               │
//! callingLLM ── AI failure ────┤            callingLLM
//!    │                         │               │
//! creating_session      creating_session    creating_session
//!  (paused)           (pending_generation)   (paused, same id)
//!    │                         │               │
//!   done                      done            done
//! ```
//!
//! Any step can end in `error` or `cancelled`. Only one run is live at a
//! time: starting a run supersedes the previous one, whose remaining writes
//! and persistence are dropped.

mod decision;
mod failure;
mod generate;
mod ingest;
mod state;
mod types;
mod validate;

#[cfg(test)]
mod tests;

pub use decision::{
    AutoContinue, ChannelPresenter, WarningDecision, WarningPresenter, WarningPrompt,
};
pub use types::{
    IngestRequest, NoOpObserver, PipelineError, PipelineEvent, PipelineObserver, PipelinePhase,
    PipelineSnapshot, RunOptions, RunOutcome, ValidationWarning,
};
pub use validate::validate;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{LessonBatch, LessonOptions, StudyAi};
use crate::config::PipelineSettings;
use crate::error::AiError;
use crate::pdf::{LopdfParser, PdfParser};
use crate::retry::{with_retry_if, with_timeout};
use crate::session::StudySession;
use crate::storage::SessionStore;

use failure::StepError;
use state::{RetryTarget, RunContext, SharedState};

/// Orchestrates extraction, validation, AI generation and persistence.
///
/// Cheap to clone; clones share the same run state, so one clone can
/// `cancel()` a run another clone is awaiting.
#[derive(Clone)]
pub struct StudyPipeline {
    ai: StudyAi,
    parser: Arc<dyn PdfParser>,
    store: Arc<dyn SessionStore>,
    presenter: Arc<dyn WarningPresenter>,
    observer: Arc<dyn PipelineObserver>,
    settings: PipelineSettings,
    state: SharedState,
}

impl StudyPipeline {
    pub fn new(ai: StudyAi, store: Arc<dyn SessionStore>) -> Self {
        Self {
            ai,
            parser: Arc::new(LopdfParser),
            store,
            presenter: Arc::new(AutoContinue),
            observer: Arc::new(NoOpObserver),
            settings: PipelineSettings::default(),
            state: SharedState::default(),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn PdfParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn WarningPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Ingest a PDF into a new study session.
    pub async fn run(&self, request: IngestRequest, options: RunOptions) -> RunOutcome {
        self.state.set_ingest_payload(request.clone());
        let ctx = self
            .state
            .begin_run(options.is_retry, self.observer.clone());
        let result = self.ingest(&ctx, &request, options).await;
        self.settle(&ctx, result, |err, has_text| {
            failure::ingest_error(err, has_text)
        })
    }

    /// Generate the lessons a safe-mode session deferred, updating it in place.
    pub async fn resume(&self, session: StudySession) -> RunOutcome {
        if !session.is_pending_generation() || session.study_text.trim().is_empty() {
            tracing::warn!(session_id = %session.id, status = session.status.as_str(), "Session cannot be resumed");
            return RunOutcome::Failed(PipelineError {
                message: "This session has no pending content to generate.".to_string(),
                retryable: false,
                safe_mode: false,
            });
        }

        self.state.set_generation_payload(session.clone());
        let ctx = self.state.begin_run(false, self.observer.clone());
        let result = self.generate(&ctx, session).await;
        self.settle(&ctx, result, |err, _| failure::generation_error(err))
    }

    /// Re-run the last attempt from its most economical point.
    pub async fn retry(&self) -> RunOutcome {
        match self.state.retry_target() {
            RetryTarget::Generation(session) => self.resume(session).await,
            RetryTarget::Ingest(request) => {
                self.run(
                    request,
                    RunOptions {
                        is_retry: true,
                        use_safe_mode: false,
                    },
                )
                .await
            }
            RetryTarget::Nothing => RunOutcome::Idle,
        }
    }

    /// Re-run the last ingestion in safe mode.
    pub async fn use_safe_mode(&self) -> RunOutcome {
        match self.state.ingest_payload() {
            Some(request) => {
                self.run(
                    request,
                    RunOptions {
                        is_retry: true,
                        use_safe_mode: true,
                    },
                )
                .await
            }
            None => RunOutcome::Idle,
        }
    }

    /// Cancel the live run. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        self.state.cancel_current()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot()
    }

    /// Turn a run's result into its outcome, recording the terminal phase.
    fn settle<F>(
        &self,
        ctx: &RunContext,
        result: Result<RunOutcome, StepError>,
        to_error: F,
    ) -> RunOutcome
    where
        F: FnOnce(&StepError, bool) -> PipelineError,
    {
        match result {
            Ok(outcome) => outcome,
            Err(err) if matches!(err, StepError::Superseded) || !ctx.is_current() => {
                tracing::info!(run_id = ctx.run_id, "Run superseded, discarding its result");
                RunOutcome::Superseded
            }
            Err(err) if err.is_cancelled() => {
                ctx.enter(PipelinePhase::Cancelled);
                ctx.log("Pipeline cancelled by user.");
                RunOutcome::Cancelled
            }
            Err(err) => {
                tracing::error!(request_id = %ctx.request_id, error = %err, "Pipeline failed");
                let error = to_error(&err, ctx.has_text());
                ctx.fail(error.clone());
                RunOutcome::Failed(error)
            }
        }
    }

    /// One AI call under the shared retry/timeout composition. Cancellation
    /// is not retried.
    async fn ai_call<T, F, Fut>(&self, budget: Duration, mut op: F) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        with_retry_if(
            || with_timeout(op(), budget),
            &self.settings.retry_delays(),
            |err: &AiError| !err.is_cancelled(),
        )
        .await
    }

    fn lesson_options(&self, ctx: &RunContext) -> LessonOptions {
        let progress_ctx = ctx.clone();
        LessonOptions::new(ctx.cancel.clone(), ctx.request_id.clone())
            .with_progress(move |progress| progress_ctx.set_progress(Some(progress)))
    }

    async fn generate_lessons(
        &self,
        ctx: &RunContext,
        text: &str,
        context: &crate::ai::AcademicContext,
    ) -> Result<LessonBatch, StepError> {
        let options = self.lesson_options(ctx);
        let batch = self
            .ai_call(self.settings.lessons_timeout(), || {
                self.ai.generate_lessons(text, context, &options)
            })
            .await?;

        if !batch.failed_chunk_indexes.is_empty() {
            ctx.log(format!(
                "Lesson generation failed for chunks {:?}; continuing with the rest.",
                batch.failed_chunk_indexes
            ));
        }
        if batch.lessons.is_empty() {
            return Err(StepError::NoLessons);
        }
        ctx.log(format!("Generated {} lessons.", batch.lessons.len()));
        Ok(batch)
    }

    /// Save `session` unless the run was superseded or cancelled meanwhile.
    async fn persist(&self, ctx: &RunContext, session: &StudySession) -> Result<(), StepError> {
        ctx.checkpoint()?;
        self.store
            .save_session(session)
            .await
            .map_err(StepError::Storage)?;
        ctx.session_created(session);
        ctx.log(format!(
            "Session {} saved ({}).",
            session.id,
            session.status.as_str()
        ));
        Ok(())
    }
}
