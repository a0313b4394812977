//! AI facade used by the pipelines.
//!
//! [`StudyAi`] wraps one [`StudyProvider`] and adds what every backend
//! shares: chunking long texts, a deadline per chunk and progress reporting.

pub mod prompts;
pub mod provider;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::AiError;
use crate::retry::with_timeout;
use crate::text::chunk_text;

pub use provider::{create_provider, MockProvider, ProviderConfig, StudyProvider};
pub use types::{
    AcademicCategory, AcademicContext, CheckQuestion, GenerationProgress, LessonBatch,
    MicroLesson, QuizContext, QuizSeed, WeightedConcept,
};

/// Callback receiving chunk progress during lesson generation.
pub type ProgressFn = Arc<dyn Fn(GenerationProgress) + Send + Sync>;

/// Per-call options for [`StudyAi::generate_lessons`].
#[derive(Clone)]
pub struct LessonOptions {
    pub cancel: CancellationToken,
    pub on_progress: ProgressFn,
    /// Correlates log lines of one pipeline run
    pub request_id: String,
}

impl LessonOptions {
    pub fn new(cancel: CancellationToken, request_id: impl Into<String>) -> Self {
        Self {
            cancel,
            on_progress: Arc::new(|_| {}),
            request_id: request_id.into(),
        }
    }

    pub fn with_progress(
        mut self,
        on_progress: impl Fn(GenerationProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Arc::new(on_progress);
        self
    }
}

#[derive(Clone)]
pub struct StudyAi {
    provider: Arc<dyn StudyProvider>,
    chunk_chars: usize,
    chunk_timeout: Duration,
}

impl StudyAi {
    pub fn new(provider: Arc<dyn StudyProvider>) -> Self {
        let defaults = crate::config::PipelineSettings::default();
        Self {
            provider,
            chunk_chars: defaults.chunk_chars,
            chunk_timeout: defaults.chunk_timeout(),
        }
    }

    pub fn with_chunking(mut self, chunk_chars: usize, chunk_timeout: Duration) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self.chunk_timeout = chunk_timeout;
        self
    }

    /// Pick the provider settings ask for.
    ///
    /// The mock answers when remote AI is disabled. With remote AI enabled a
    /// provider must be configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider: Arc<dyn StudyProvider> = if !settings.use_ai_api {
            Arc::new(MockProvider::new())
        } else {
            match &settings.provider {
                Some(config) => create_provider(config),
                None => anyhow::bail!(
                    "No AI provider configured. Run `studyflow configure` or disable AI calls."
                ),
            }
        };

        tracing::info!(
            provider = provider.provider_name(),
            model = provider.model_id(),
            "AI provider selected"
        );

        Ok(Self::new(provider).with_chunking(
            settings.pipeline.chunk_chars,
            settings.pipeline.chunk_timeout(),
        ))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Split `text` the way [`StudyAi::generate_lessons`] will.
    pub fn plan_chunks(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_chars)
    }

    pub async fn classify(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AcademicContext, AiError> {
        self.provider.classify(text, cancel).await
    }

    pub async fn generate_title(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        self.provider.generate_title(text, cancel).await
    }

    /// Generate lessons chunk by chunk.
    ///
    /// Progress starts at `{done: 0, total}` and advances after every chunk,
    /// failed or not. A failed chunk is recorded and skipped; the call only
    /// fails when every chunk failed, returning the last error. Cancellation
    /// aborts immediately.
    pub async fn generate_lessons(
        &self,
        text: &str,
        context: &AcademicContext,
        options: &LessonOptions,
    ) -> Result<LessonBatch, AiError> {
        let chunks = self.plan_chunks(text);
        let total = chunks.len();
        (options.on_progress)(GenerationProgress { done: 0, total });

        let mut batch = LessonBatch::default();
        let mut last_error = None;

        for (index, chunk) in chunks.iter().enumerate() {
            if options.cancel.is_cancelled() {
                return Err(AiError::Cancelled);
            }

            let result = with_timeout(
                self.provider
                    .generate_lessons(chunk, context, &options.cancel),
                self.chunk_timeout,
            )
            .await;

            match result {
                Ok(mut lessons) => {
                    tracing::debug!(
                        request_id = %options.request_id,
                        chunk = index,
                        lessons = lessons.len(),
                        "Chunk generated"
                    );
                    batch.lessons.append(&mut lessons);
                }
                Err(AiError::Cancelled) => return Err(AiError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        request_id = %options.request_id,
                        chunk = index,
                        error = %e,
                        "Lesson generation failed for chunk"
                    );
                    batch.failed_chunk_indexes.push(index);
                    last_error = Some(e);
                }
            }

            (options.on_progress)(GenerationProgress {
                done: index + 1,
                total,
            });
        }

        if batch.failed_chunk_indexes.len() == total {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(batch)
    }
}
