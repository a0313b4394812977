//! OpenAI API provider
//!
//! Uses the Responses API via async-openai, streaming the answer text.

use async_openai::{
    config::OpenAIConfig,
    types::responses::{
        CreateResponse, EasyInputContent, EasyInputMessage, InputItem, InputParam, MessageType,
        ResponseStreamEvent, Role,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::StudyProvider;
use crate::ai::prompts::JsonRequest;
use crate::error::AiError;

const INSTRUCTIONS: &str = "You are a study assistant. Respond only with a single JSON \
                            document, without markdown fences or commentary.";

/// OpenAI API provider using the Responses API
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given API key and model
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

/// The Responses API has no Gemini-style schema field, so the schema rides
/// along in the instructions.
fn instructions_for(request: &JsonRequest) -> String {
    format!(
        "{} The JSON must match this schema: {}",
        INSTRUCTIONS, request.schema
    )
}

#[async_trait]
impl StudyProvider for OpenAIProvider {
    async fn complete(
        &self,
        request: &JsonRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        let create = CreateResponse {
            model: Some(self.model.clone()),
            input: InputParam::Items(vec![InputItem::EasyMessage(EasyInputMessage {
                r#type: MessageType::Message,
                role: Role::User,
                content: EasyInputContent::Text(request.prompt.clone()),
            })]),
            instructions: Some(instructions_for(request)),
            stream: Some(true),
            ..Default::default()
        };

        let responses = self.client.responses();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            created = responses.create_stream(create) => {
                created.map_err(|e| AiError::from_message(e.to_string()))?
            }
        };

        let mut text_content = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AiError::Cancelled),
                next = stream.next() => next,
            };
            let Some(event_result) = next else {
                break;
            };

            let event = event_result.map_err(|e| AiError::from_message(e.to_string()))?;

            match event {
                ResponseStreamEvent::ResponseOutputTextDelta(delta) => {
                    text_content.push_str(&delta.delta);
                }

                ResponseStreamEvent::ResponseCompleted(_) => {
                    debug!("Response completed");
                }

                ResponseStreamEvent::ResponseFailed(failed) => {
                    return Err(AiError::from_message(format!(
                        "Response failed: {:?}",
                        failed.response.error
                    )));
                }

                ResponseStreamEvent::ResponseError(err) => {
                    return Err(AiError::from_message(err.message));
                }

                _ => {}
            }
        }

        if text_content.trim().is_empty() {
            return Err(AiError::Malformed("empty response".to_string()));
        }

        debug!(
            kind = request.kind.as_str(),
            chars = text_content.len(),
            "OpenAI response received"
        );
        Ok(text_content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
