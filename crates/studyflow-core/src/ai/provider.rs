//! Study provider abstraction for LLM inference
//!
//! This module provides a unified interface for the supported backends:
//! - Google Gemini API
//! - OpenAI API
//! - An offline mock used when AI calls are disabled

pub mod gemini;
pub mod mock;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::prompts::{self, JsonRequest};
use super::types::{AcademicContext, MicroLesson};
use crate::error::AiError;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAIProvider;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Unified study provider interface
///
/// Implementors only need [`StudyProvider::complete`]; the structured
/// operations build their prompt, call it and parse the answer.
#[async_trait]
pub trait StudyProvider: Send + Sync {
    /// Answer a prompt with the raw JSON text produced by the model.
    ///
    /// Must return [`AiError::Cancelled`] promptly once `cancel` fires.
    async fn complete(
        &self,
        request: &JsonRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AiError>;

    async fn classify(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AcademicContext, AiError> {
        let raw = self.complete(&prompts::classify_request(text), cancel).await?;
        prompts::parse_classification(&raw)
    }

    async fn generate_title(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AiError> {
        let raw = self.complete(&prompts::title_request(text), cancel).await?;
        prompts::parse_title(&raw)
    }

    /// Generate lessons for a single chunk of text.
    async fn generate_lessons(
        &self,
        text: &str,
        context: &AcademicContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<MicroLesson>, AiError> {
        let raw = self
            .complete(&prompts::lessons_request(text, context), cancel)
            .await?;
        prompts::parse_lessons(&raw, text)
    }

    /// Get the provider name (e.g., "gemini", "openai", "mock")
    fn provider_name(&self) -> &'static str;

    /// Get the model identifier
    fn model_id(&self) -> &str;
}

/// Provider configuration stored in settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Gemini API
    Gemini { api_key: String, model: String },
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI { api_key: String, model: String },
}

impl ProviderConfig {
    /// Get the provider type name
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::OpenAI { .. } => "openai",
        }
    }

    /// Get the model ID
    pub fn model_id(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } => model,
            ProviderConfig::OpenAI { model, .. } => model,
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::Gemini { api_key, .. } => api_key,
            ProviderConfig::OpenAI { api_key, .. } => api_key,
        }
    }

    /// Build a config for a provider tag, falling back to its default model.
    pub fn from_tag(tag: &str, api_key: String, model: Option<String>) -> Result<Self> {
        match tag {
            "gemini" => Ok(ProviderConfig::Gemini {
                api_key,
                model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            }),
            "openai" => Ok(ProviderConfig::OpenAI {
                api_key,
                model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            }),
            other => anyhow::bail!("Unknown provider: {}", other),
        }
    }
}

/// Provider family for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFamily {
    pub id: String,
    pub name: String,
    pub description: String,
    pub requires_api_key: bool,
}

/// Get available provider families
pub fn get_provider_families() -> Vec<ProviderFamily> {
    vec![
        ProviderFamily {
            id: "gemini".to_string(),
            name: "Gemini".to_string(),
            description: "Google Gemini models with native JSON output".to_string(),
            requires_api_key: true,
        },
        ProviderFamily {
            id: "openai".to_string(),
            name: "OpenAI".to_string(),
            description: "GPT-4o and other OpenAI models".to_string(),
            requires_api_key: true,
        },
    ]
}

/// Instantiate the provider a config describes.
pub fn create_provider(config: &ProviderConfig) -> Arc<dyn StudyProvider> {
    match config {
        ProviderConfig::Gemini { api_key, model } => Arc::new(GeminiProvider::new(api_key, model)),
        ProviderConfig::OpenAI { api_key, model } => Arc::new(OpenAIProvider::new(api_key, model)),
    }
}
