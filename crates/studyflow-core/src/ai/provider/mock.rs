//! Offline provider used when AI calls are disabled.
//!
//! Answers every request with a fixed JSON document after a short delay so
//! the pipeline can be exercised end to end without network access.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::StudyProvider;
use crate::ai::prompts::{JsonRequest, RequestKind};
use crate::error::AiError;

const DEFAULT_DELAY: Duration = Duration::from_millis(300);

pub const MOCK_TITLE: &str = "Sample Study Session";

#[derive(Debug, Clone)]
pub struct MockProvider {
    delay: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    fn canned_answer(kind: RequestKind) -> serde_json::Value {
        match kind {
            RequestKind::Classify => json!({
                "category": "general",
                "keywords": ["sample", "mock", "study"]
            }),
            RequestKind::Title => json!({ "title": MOCK_TITLE }),
            RequestKind::Lessons => json!({
                "lessons": [{
                    "title": "Mock lesson",
                    "content": "This lesson was produced without contacting an AI service.",
                    "analogy": "Like a rehearsal before the real performance.",
                    "keyPoints": ["Offline mode", "Fixed content", "Full pipeline"],
                    "checkQuestion": {
                        "question": "Why does this lesson exist?",
                        "idealAnswer": "To exercise the study flow without an AI provider.",
                        "concepts": [
                            { "idea": "offline mode", "weight": 0.6 },
                            { "idea": "testing", "weight": 0.2 }
                        ],
                        "passingThreshold": 0.6
                    },
                    "advancedQuestion": {
                        "question": "What would change with a real provider?",
                        "idealAnswer": "The lessons would be generated from the document.",
                        "concepts": [{ "idea": "generated content", "weight": 0.6 }],
                        "passingThreshold": 0.6
                    },
                    "quizSeeds": [{
                        "stem": "Which provider produced this lesson?",
                        "answer": "mock",
                        "distractors": ["gemini", "openai"]
                    }]
                }]
            }),
        }
    }
}

#[async_trait]
impl StudyProvider for MockProvider {
    async fn complete(
        &self,
        request: &JsonRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        Ok(Self::canned_answer(request.kind).to_string())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}
