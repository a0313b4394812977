//! Lesson data produced by the AI providers.
//!
//! Field names are camelCase because this is also the JSON contract the
//! models are prompted to answer with.

use serde::{Deserialize, Serialize};

/// Broad category used to tailor lesson generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicCategory {
    #[serde(alias = "Technical", alias = "Técnico")]
    Technical,
    #[serde(alias = "Theoretical", alias = "Teórico")]
    Theoretical,
    #[serde(alias = "Memorization", alias = "Memorístico")]
    Memorization,
    #[serde(
        alias = "Problem Solving",
        alias = "ProblemSolving",
        alias = "Resolución de Problemas"
    )]
    ProblemSolving,
    #[default]
    #[serde(other, alias = "General")]
    General,
}

impl AcademicCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Theoretical => "theoretical",
            Self::Memorization => "memorization",
            Self::ProblemSolving => "problem_solving",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for AcademicCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a study text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcademicContext {
    #[serde(default)]
    pub category: AcademicCategory,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedConcept {
    pub idea: String,
    pub weight: f64,
}

fn default_passing_threshold() -> f64 {
    0.6
}

/// Open question checked against weighted concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuestion {
    pub question: String,
    #[serde(default)]
    pub ideal_answer: String,
    #[serde(default)]
    pub concepts: Vec<WeightedConcept>,
    #[serde(default = "default_passing_threshold")]
    pub passing_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSeed {
    pub stem: String,
    pub answer: String,
    #[serde(default)]
    pub distractors: Vec<String>,
}

/// Material kept with a lesson for offline review quizzes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizContext {
    pub lesson_title: String,
    pub cleaned_text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub quiz_seeds: Vec<QuizSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroLesson {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub analogy: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub check_question: CheckQuestion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_question: Option<CheckQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_context: Option<QuizContext>,
}

/// Chunk-level progress of lesson generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub done: usize,
    pub total: usize,
}

/// Lessons from every chunk that succeeded, plus the indexes that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonBatch {
    pub lessons: Vec<MicroLesson>,
    pub failed_chunk_indexes: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_accepts_display_labels() {
        let parsed: AcademicCategory = serde_json::from_str("\"Técnico\"").unwrap();
        assert_eq!(parsed, AcademicCategory::Technical);

        let parsed: AcademicCategory = serde_json::from_str("\"Problem Solving\"").unwrap();
        assert_eq!(parsed, AcademicCategory::ProblemSolving);

        let parsed: AcademicCategory = serde_json::from_str("\"problem_solving\"").unwrap();
        assert_eq!(parsed, AcademicCategory::ProblemSolving);
    }

    #[test]
    fn test_unknown_category_is_general() {
        let parsed: AcademicCategory = serde_json::from_str("\"Astrology\"").unwrap();
        assert_eq!(parsed, AcademicCategory::General);
    }

    #[test]
    fn test_check_question_defaults() {
        let q: CheckQuestion = serde_json::from_str(r#"{"question": "Why?"}"#).unwrap();
        assert_eq!(q.passing_threshold, 0.6);
        assert!(q.concepts.is_empty());
    }
}
