//! StudyFlow Core - PDF ingestion and AI lesson generation
//!
//! This crate contains the functionality behind StudyFlow, including:
//! - PDF text extraction (lopdf)
//! - Text normalization and chunking
//! - AI providers (Gemini, OpenAI, offline mock)
//! - The ingestion pipeline with retry, timeout and safe-mode fallback
//! - Study session persistence

pub mod ai;
pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod storage;
pub mod text;

pub use ai::StudyAi;
pub use config::{Config, PipelineSettings, Settings};
pub use error::{AiError, ExtractError};
pub use pipeline::{IngestRequest, RunOptions, RunOutcome, StudyPipeline};
pub use session::{Course, SessionStatus, StudyMethod, StudySession};
pub use storage::{JsonSessionStore, SessionStore};
