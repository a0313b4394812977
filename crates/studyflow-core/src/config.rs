use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ai::provider::ProviderConfig;
use crate::retry::delays_from_millis;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/studyflow)
    pub data_dir: PathBuf,
    /// Study sessions storage directory
    pub sessions_dir: PathBuf,
    /// User settings file
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studyflow");
        Self::with_data_dir(data_dir)
    }

    /// Configuration rooted at an explicit directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            sessions_dir: data_dir.join("sessions"),
            settings_file: data_dir.join("settings.json"),
            data_dir,
        }
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.sessions_dir)?;
        Ok(())
    }
}

/// User settings persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// When false, the offline mock provider answers every AI request
    #[serde(default = "default_true")]
    pub use_ai_api: bool,
    /// Remote provider used when `use_ai_api` is set
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    /// Owner recorded on new sessions
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_true() -> bool {
    true
}

fn default_user_id() -> String {
    "local".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_ai_api: true,
            provider: None,
            user_id: default_user_id(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing or invalid
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load settings from {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read settings file")?;
        serde_json::from_str(&content).context("Failed to parse settings JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }
}

/// Budgets and thresholds of the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub parse_timeout_ms: u64,
    pub classify_timeout_ms: u64,
    pub title_timeout_ms: u64,
    /// Envelope around the whole chunked lesson generation
    pub lessons_timeout_ms: u64,
    pub chunk_timeout_ms: u64,
    /// Waits before each retry; `n` delays allow `n + 1` attempts
    pub retry_delays_ms: Vec<u64>,
    pub min_text_chars: usize,
    pub max_pages: usize,
    pub chunk_chars: usize,
    /// Fall back to a pending session when generation fails after parsing
    pub auto_safe_mode: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parse_timeout_ms: 12_000,
            classify_timeout_ms: 30_000,
            title_timeout_ms: 30_000,
            lessons_timeout_ms: 120_000,
            chunk_timeout_ms: 60_000,
            retry_delays_ms: vec![500, 1500],
            min_text_chars: 200,
            max_pages: 80,
            chunk_chars: 60_000,
            auto_safe_mode: true,
        }
    }
}

impl PipelineSettings {
    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_millis(self.title_timeout_ms)
    }

    pub fn lessons_timeout(&self) -> Duration {
        Duration::from_millis(self.lessons_timeout_ms)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        delays_from_millis(&self.retry_delays_ms)
    }
}
