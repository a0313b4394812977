//! Session persistence.
//!
//! The pipelines only need an idempotent upsert; listing, loading and
//! deleting serve the housekeeping commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::session::{SessionStatus, StudySession};

/// Summary of a session for listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub course_name: String,
    pub status: SessionStatus,
    pub lesson_count: usize,
    pub updated_at: String,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session with the same id.
    async fn save_session(&self, session: &StudySession) -> Result<()>;

    async fn load_session(&self, id: &str) -> Result<StudySession>;

    /// Summaries sorted by most recent update first.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Delete a session that is not completed or archived.
    async fn delete_session(&self, id: &str) -> Result<()>;
}

/// One JSON file per session.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    sessions_dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    /// Get the path for a specific session.
    ///
    /// Session ids are UUIDs; anything else cannot name a session file and
    /// is reported as not found.
    pub fn session_path(&self, id: &str) -> Result<PathBuf> {
        let uuid = Uuid::parse_str(id).map_err(|_| anyhow::anyhow!("Session not found: {}", id))?;
        Ok(self.sessions_dir.join(format!("{}.json", uuid.hyphenated())))
    }
}

fn read_session(path: &Path) -> Result<StudySession> {
    let content = std::fs::read_to_string(path).context("Failed to read session file")?;
    let session: StudySession =
        serde_json::from_str(&content).context("Failed to parse session JSON")?;
    Ok(session)
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn save_session(&self, session: &StudySession) -> Result<()> {
        tokio::fs::create_dir_all(&self.sessions_dir)
            .await
            .context("Failed to create sessions directory")?;
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        tokio::fs::write(self.session_path(&session.id)?, content)
            .await
            .context("Failed to write session file")?;
        tracing::debug!(session_id = %session.id, status = session.status.as_str(), "Session saved");
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<StudySession> {
        let path = self.session_path(id)?;
        if !path.exists() {
            anyhow::bail!("Session not found: {}", id);
        }
        read_session(&path)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();

        if !self.sessions_dir.exists() {
            return Ok(summaries);
        }

        for entry in std::fs::read_dir(&self.sessions_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                match read_session(&path) {
                    Ok(session) => summaries.push(SessionSummary {
                        lesson_count: session.micro_lessons.len(),
                        id: session.id,
                        title: session.title,
                        course_name: session.course_name,
                        status: session.status,
                        updated_at: session.updated_at,
                    }),
                    Err(e) => {
                        tracing::warn!("Failed to load session {:?}: {}", path, e);
                    }
                }
            }
        }

        // RFC 3339 timestamps in UTC sort lexicographically
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(summaries)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let path = self.session_path(id)?;
        if !path.exists() {
            anyhow::bail!("Session not found: {}", id);
        }
        let session = read_session(&path)?;
        if !session.can_discard() {
            anyhow::bail!(
                "Session {} is {} and cannot be deleted",
                id,
                session.status.as_str()
            );
        }
        tokio::fs::remove_file(&path)
            .await
            .context("Failed to delete session file")?;
        Ok(())
    }
}
