use super::failure::StepError;
use super::state::RunContext;
use super::types::{PipelinePhase, RunOutcome};
use super::StudyPipeline;
use crate::session::StudySession;

impl StudyPipeline {
    /// Fill in the AI content of a pending-generation session.
    pub(super) async fn generate(
        &self,
        ctx: &RunContext,
        mut session: StudySession,
    ) -> Result<RunOutcome, StepError> {
        ctx.enter(PipelinePhase::Starting);
        ctx.log(format!(
            "Generating content for \"{}\" (AI: {}).",
            session.title,
            self.ai.provider_name()
        ));

        let text = session.study_text.clone();

        ctx.enter(PipelinePhase::CallingLlm);
        ctx.set_progress(None);

        let context = match session.academic_context.clone() {
            Some(context) => {
                ctx.log(format!("Reusing classification ({}).", context.category));
                context
            }
            None => {
                ctx.log("Classifying content...");
                let context = self
                    .ai_call(self.settings.classify_timeout(), || {
                        self.ai.classify(&text, &ctx.cancel)
                    })
                    .await?;
                ctx.checkpoint()?;
                context
            }
        };

        ctx.log("Generating lessons...");
        let batch = self.generate_lessons(ctx, &text, &context).await?;
        ctx.checkpoint()?;

        ctx.enter(PipelinePhase::CreatingSession);
        session.complete_generation(batch.lessons, context);
        self.persist(ctx, &session).await?;

        ctx.enter(PipelinePhase::Done);
        Ok(RunOutcome::Completed(session))
    }
}
