//! Study sessions produced by the pipelines.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::types::{AcademicContext, MicroLesson};

pub const SAFE_MODE_PREFIX: &str = "(Safe Mode) ";
pub const PARTIAL_PREFIX: &str = "(Partial) ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Text captured, lessons not generated yet
    PendingGeneration,
    Paused,
    Completed,
    Archived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingGeneration => "pending_generation",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMethod {
    #[default]
    Pomodoro,
    Long,
}

impl std::str::FromStr for StudyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pomodoro" => Ok(Self::Pomodoro),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown study method: {}", other)),
        }
    }
}

/// Course a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

impl Course {
    /// Course with a stable id derived from the owner and the name.
    pub fn named(user_id: &str, name: &str) -> Self {
        let key = format!("{}/{}", user_id, name.trim().to_lowercase());
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonMetrics {
    pub correct: u32,
    pub attempts: u32,
    pub time_spent_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub course_id: String,
    pub course_name: String,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
    pub status: SessionStatus,
    pub study_method: StudyMethod,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub weak_concepts: Vec<String>,
    #[serde(default)]
    pub current_lesson_index: usize,
    #[serde(default)]
    pub user_explanations: HashMap<String, String>,
    #[serde(default)]
    pub micro_lesson_metrics: HashMap<String, LessonMetrics>,
    pub study_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_context: Option<AcademicContext>,
    #[serde(default)]
    pub micro_lessons: Vec<MicroLesson>,
}

impl StudySession {
    fn base(
        title: String,
        course: &Course,
        method: StudyMethod,
        status: SessionStatus,
        study_text: String,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: course.user_id.clone(),
            title,
            course_id: course.id.clone(),
            course_name: course.name.clone(),
            created_at: now.clone(),
            updated_at: now,
            status,
            study_method: method,
            duration_ms: 0,
            weak_concepts: Vec::new(),
            current_lesson_index: 0,
            user_explanations: HashMap::new(),
            micro_lesson_metrics: HashMap::new(),
            study_text,
            academic_context: None,
            micro_lessons: Vec::new(),
        }
    }

    /// Safe-mode session: text captured, AI content deferred.
    pub fn pending_generation(
        file_name: &str,
        course: &Course,
        method: StudyMethod,
        study_text: String,
    ) -> Self {
        Self::base(
            format!("{}{}", SAFE_MODE_PREFIX, file_name),
            course,
            method,
            SessionStatus::PendingGeneration,
            study_text,
        )
    }

    /// Fully generated session, ready to study.
    pub fn generated(
        title: String,
        course: &Course,
        method: StudyMethod,
        study_text: String,
        context: AcademicContext,
        lessons: Vec<MicroLesson>,
    ) -> Self {
        let mut session = Self::base(title, course, method, SessionStatus::Paused, study_text);
        session.academic_context = Some(context);
        session.micro_lessons = lessons;
        session
    }

    pub fn is_pending_generation(&self) -> bool {
        self.status == SessionStatus::PendingGeneration
    }

    /// Completed and archived sessions are kept for history; only work in
    /// progress may be deleted.
    pub fn can_discard(&self) -> bool {
        !matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Archived
        )
    }

    /// Attach generated lessons in place, keeping the session id.
    pub fn complete_generation(&mut self, lessons: Vec<MicroLesson>, context: AcademicContext) {
        self.title = strip_markers(&self.title);
        self.academic_context = Some(context);
        self.micro_lessons = lessons;
        self.current_lesson_index = 0;
        self.status = SessionStatus::Paused;
        self.touch();
    }

    pub fn mark_completed(&mut self) {
        self.status = SessionStatus::Completed;
        self.touch();
    }

    pub fn archive(&mut self) {
        self.status = SessionStatus::Archived;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Remove safe-mode and partial markers from a title, wherever they were
/// stacked.
pub fn strip_markers(title: &str) -> String {
    let mut title = title.trim();
    loop {
        if let Some(rest) = title.strip_prefix(SAFE_MODE_PREFIX) {
            title = rest;
        } else if let Some(rest) = title.strip_prefix(PARTIAL_PREFIX) {
            title = rest;
        } else {
            break;
        }
    }
    title.trim().to_string()
}
