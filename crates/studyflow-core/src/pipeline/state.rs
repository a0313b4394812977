//! Shared run state and the per-run handle that mutates it.
//!
//! Every mutation goes through a [`RunContext`] carrying the run id it was
//! created for. Once a newer run has started, a stale context's writes are
//! silently dropped, so an old run finishing late cannot clobber the state
//! of the current one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::failure::StepError;
use super::types::{
    IngestRequest, PipelineError, PipelineEvent, PipelineObserver, PipelinePhase,
    PipelineSnapshot,
};
use crate::ai::types::GenerationProgress;
use crate::pdf::ExtractedDocument;
use crate::session::StudySession;

#[derive(Default)]
pub(crate) struct RunState {
    run_id: u64,
    request_id: String,
    phase: Option<PipelinePhase>,
    logs: Vec<String>,
    progress: Option<GenerationProgress>,
    error: Option<PipelineError>,
    cancel: CancellationToken,
    /// Extraction result kept so a retry skips parsing
    extracted: Option<ExtractedDocument>,
    /// Last ingestion request, replayed by retry and safe mode
    payload: Option<IngestRequest>,
    /// Session being generated, replayed by retry
    generation_payload: Option<StudySession>,
}

/// What a retry would replay.
pub(crate) enum RetryTarget {
    Generation(StudySession),
    Ingest(IngestRequest),
    Nothing,
}

#[derive(Clone, Default)]
pub(crate) struct SharedState(Arc<Mutex<RunState>>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new run, superseding and cancelling the previous one.
    ///
    /// A fresh run clears logs, progress, error and captured text; a retry
    /// keeps logs and text.
    pub(crate) fn begin_run(
        &self,
        is_retry: bool,
        observer: Arc<dyn PipelineObserver>,
    ) -> RunContext {
        let mut state = self.lock();
        state.cancel.cancel();

        state.run_id += 1;
        state.cancel = CancellationToken::new();
        state.request_id = Uuid::new_v4().to_string();
        state.phase = None;
        state.error = None;
        state.progress = None;
        if !is_retry {
            state.logs.clear();
            state.extracted = None;
        }

        RunContext {
            run_id: state.run_id,
            request_id: state.request_id.clone(),
            cancel: state.cancel.clone(),
            shared: self.clone(),
            observer,
        }
    }

    pub(crate) fn set_ingest_payload(&self, request: IngestRequest) {
        let mut state = self.lock();
        state.payload = Some(request);
        state.generation_payload = None;
    }

    pub(crate) fn set_generation_payload(&self, session: StudySession) {
        self.lock().generation_payload = Some(session);
    }

    pub(crate) fn retry_target(&self) -> RetryTarget {
        let state = self.lock();
        if let Some(session) = &state.generation_payload {
            RetryTarget::Generation(session.clone())
        } else if let Some(request) = &state.payload {
            RetryTarget::Ingest(request.clone())
        } else {
            RetryTarget::Nothing
        }
    }

    pub(crate) fn ingest_payload(&self) -> Option<IngestRequest> {
        self.lock().payload.clone()
    }

    pub(crate) fn cancel_current(&self) -> bool {
        let state = self.lock();
        let live = state.phase.is_some_and(|p| !p.is_terminal());
        state.cancel.cancel();
        live
    }

    pub(crate) fn snapshot(&self) -> PipelineSnapshot {
        let state = self.lock();
        PipelineSnapshot {
            run_id: state.run_id,
            request_id: state.request_id.clone(),
            phase: state.phase,
            logs: state.logs.clone(),
            progress: state.progress,
            error: state.error.clone(),
            has_text: state.extracted.is_some(),
        }
    }
}

/// Handle owned by one run.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub(crate) run_id: u64,
    pub(crate) request_id: String,
    pub(crate) cancel: CancellationToken,
    shared: SharedState,
    observer: Arc<dyn PipelineObserver>,
}

impl RunContext {
    pub(crate) fn is_current(&self) -> bool {
        self.shared.lock().run_id == self.run_id
    }

    /// Resumption guard: stop if superseded or cancelled.
    pub(crate) fn checkpoint(&self) -> Result<(), StepError> {
        if !self.is_current() {
            return Err(StepError::Superseded);
        }
        if self.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    /// Apply `f` to the state if this run is still current, then deliver the
    /// events it produced outside the lock.
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RunState, &mut Vec<PipelineEvent>),
    {
        let mut events = Vec::new();
        {
            let mut state = self.shared.lock();
            if state.run_id != self.run_id {
                return;
            }
            f(&mut state, &mut events);
        }
        for event in events {
            self.observer.on_event(event);
        }
    }

    /// Append a timestamped line to the user-visible log.
    pub(crate) fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(request_id = %self.request_id, run_id = self.run_id, "{}", message);
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), message);
        self.update(|state, events| {
            state.logs.push(line.clone());
            events.push(PipelineEvent::Log(line));
        });
    }

    /// Move to `phase`, logging the transition. Backward moves and moves out
    /// of a terminal phase are ignored.
    pub(crate) fn enter(&self, phase: PipelinePhase) {
        let mut entered = false;
        self.update(|state, events| {
            let allowed = match state.phase {
                None => true,
                Some(current) => current.can_transition_to(phase),
            };
            if allowed {
                state.phase = Some(phase);
                events.push(PipelineEvent::Phase(phase));
                entered = true;
            } else {
                tracing::warn!(
                    run_id = self.run_id,
                    from = ?state.phase,
                    to = %phase,
                    "Ignoring invalid phase transition"
                );
            }
        });
        if entered {
            self.log(format!("Entering phase: {}", phase));
        }
    }

    pub(crate) fn set_progress(&self, progress: Option<GenerationProgress>) {
        self.update(|state, events| {
            state.progress = progress;
            if let Some(progress) = progress {
                events.push(PipelineEvent::Progress(progress));
            }
        });
    }

    pub(crate) fn store_extracted(&self, doc: ExtractedDocument) {
        self.update(|state, _| state.extracted = Some(doc));
    }

    pub(crate) fn extracted(&self) -> Option<ExtractedDocument> {
        self.shared.lock().extracted.clone()
    }

    pub(crate) fn has_text(&self) -> bool {
        self.shared
            .lock()
            .extracted
            .as_ref()
            .is_some_and(|doc| !doc.text.trim().is_empty())
    }

    pub(crate) fn fail(&self, error: PipelineError) {
        self.log(format!("ERROR: {}", error.message));
        self.enter(PipelinePhase::Error);
        self.update(|state, events| {
            state.error = Some(error.clone());
            events.push(PipelineEvent::Failed(error));
        });
    }

    pub(crate) fn session_created(&self, session: &StudySession) {
        let event = PipelineEvent::SessionCreated {
            session_id: session.id.clone(),
            status: session.status,
        };
        self.update(|_, events| events.push(event));
    }
}
