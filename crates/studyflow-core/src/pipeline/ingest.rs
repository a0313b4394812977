use super::decision::{request_decision, WarningDecision};
use super::failure::StepError;
use super::state::RunContext;
use super::types::{IngestRequest, PipelinePhase, RunOptions, RunOutcome};
use super::validate::validate;
use super::StudyPipeline;
use crate::ai::prompts::{truncate_chars, TITLE_SAMPLE_CHARS};
use crate::error::ExtractError;
use crate::pdf::{ExtractedDocument, SourceDocument};
use crate::retry::{with_retry_if, with_timeout};
use crate::session::StudySession;
use crate::text::{char_len, normalize_text};

impl StudyPipeline {
    pub(super) async fn ingest(
        &self,
        ctx: &RunContext,
        request: &IngestRequest,
        options: RunOptions,
    ) -> Result<RunOutcome, StepError> {
        ctx.enter(PipelinePhase::Starting);
        ctx.log(format!(
            "Processing {} (method: {:?}, course: {}, AI: {}).",
            request.source.name,
            request.method,
            request.course.name,
            self.ai.provider_name()
        ));

        let cached = if options.is_retry {
            ctx.extracted()
        } else {
            None
        };
        let doc = match cached {
            Some(doc) => {
                ctx.log("Reusing text parsed by the previous attempt.");
                doc
            }
            None => {
                ctx.enter(PipelinePhase::Parsing);
                let doc = self.parse(ctx, &request.source).await?;
                ctx.checkpoint()?;
                ctx.store_extracted(doc.clone());
                doc
            }
        };

        if options.use_safe_mode {
            ctx.log("Safe mode requested, skipping AI generation.");
            return self.create_safe_mode_session(ctx, request, &doc.text).await;
        }

        ctx.enter(PipelinePhase::Validating);
        ctx.log(format!(
            "Parsed {} characters from {} pages.",
            char_len(&doc.text),
            doc.page_count
        ));

        let warnings = validate(&doc, &self.settings);
        if !warnings.is_empty() {
            let listed: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
            ctx.log(format!("Warnings found: {}", listed.join(" ")));

            let decision = request_decision(
                self.presenter.as_ref(),
                &request.source.name,
                warnings,
                &ctx.cancel,
            )
            .await?;
            ctx.checkpoint()?;

            if decision == WarningDecision::UseSafeMode {
                ctx.log("Safe mode chosen after warnings.");
                return self.create_safe_mode_session(ctx, request, &doc.text).await;
            }
            ctx.log("Continuing despite warnings.");
        }

        let text = normalize_text(&doc.text);

        match self.generate_new_session(ctx, request, &text).await {
            Err(err)
                if err.is_ai_failure()
                    && !err.is_cancelled()
                    && self.settings.auto_safe_mode
                    && !text.is_empty() =>
            {
                tracing::error!(request_id = %ctx.request_id, error = %err, "Critical AI failure, forcing safe mode");
                ctx.log("ERROR: Critical AI failure. Creating a safe mode session.");
                self.create_safe_mode_session(ctx, request, &doc.text).await
            }
            other => other,
        }
    }

    /// Extraction under the parse budget, retried unless aborted.
    async fn parse(
        &self,
        ctx: &RunContext,
        source: &SourceDocument,
    ) -> Result<ExtractedDocument, StepError> {
        let doc = with_retry_if(
            || with_timeout(self.parser.extract(source, &ctx.cancel), self.settings.parse_timeout()),
            &self.settings.retry_delays(),
            |err: &ExtractError| !err.is_aborted(),
        )
        .await?;
        Ok(doc)
    }

    async fn generate_new_session(
        &self,
        ctx: &RunContext,
        request: &IngestRequest,
        text: &str,
    ) -> Result<RunOutcome, StepError> {
        let chunks = self.ai.plan_chunks(text).len();
        if chunks > 1 {
            ctx.enter(PipelinePhase::Chunking);
            ctx.log(format!("Text split into {} chunks.", chunks));
        }

        ctx.enter(PipelinePhase::CallingLlm);
        ctx.set_progress(None);

        ctx.log("Classifying content...");
        let context = self
            .ai_call(self.settings.classify_timeout(), || {
                self.ai.classify(text, &ctx.cancel)
            })
            .await?;
        ctx.checkpoint()?;
        ctx.log(format!("Classified as {}.", context.category));

        ctx.log("Generating title and lessons...");
        let title_sample = truncate_chars(text, TITLE_SAMPLE_CHARS);
        let title_call = self.ai_call(self.settings.title_timeout(), || {
            self.ai.generate_title(title_sample, &ctx.cancel)
        });
        let lessons_call = self.generate_lessons(ctx, text, &context);
        let (title, lessons) = tokio::join!(title_call, lessons_call);

        let batch = lessons?;
        ctx.checkpoint()?;
        let title = match title {
            Ok(title) => title,
            Err(err) if err.is_cancelled() => return Err(err.into()),
            Err(err) => {
                ctx.log(format!(
                    "Title generation failed ({}); using the file name.",
                    err
                ));
                request.source.name.clone()
            }
        };

        ctx.enter(PipelinePhase::CreatingSession);
        let session = StudySession::generated(
            title,
            &request.course,
            request.method,
            text.to_string(),
            context,
            batch.lessons,
        );
        self.persist(ctx, &session).await?;

        ctx.enter(PipelinePhase::Done);
        Ok(RunOutcome::Completed(session))
    }

    async fn create_safe_mode_session(
        &self,
        ctx: &RunContext,
        request: &IngestRequest,
        raw_text: &str,
    ) -> Result<RunOutcome, StepError> {
        let text = normalize_text(raw_text);
        if text.is_empty() {
            return Err(StepError::EmptyText);
        }

        ctx.enter(PipelinePhase::CreatingSession);
        let session = StudySession::pending_generation(
            &request.source.name,
            &request.course,
            request.method,
            text,
        );
        self.persist(ctx, &session).await?;

        ctx.enter(PipelinePhase::Done);
        ctx.log("Safe mode session created. AI content can be generated later.");
        Ok(RunOutcome::SafeMode(session))
    }
}
