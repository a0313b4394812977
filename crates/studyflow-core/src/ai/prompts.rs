//! Prompt construction and response parsing shared by every provider.
//!
//! Providers only move text: a [`JsonRequest`] goes out, a raw string comes
//! back, and the helpers here turn that string into typed lesson data.

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::types::{AcademicContext, CheckQuestion, MicroLesson, QuizContext, QuizSeed};
use crate::error::AiError;

/// Characters of the document used for classification.
pub const CLASSIFY_SAMPLE_CHARS: usize = 2000;

/// Characters of the document used for the title.
pub const TITLE_SAMPLE_CHARS: usize = 1000;

/// What a request is asking the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Classify,
    Title,
    Lessons,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Title => "title",
            Self::Lessons => "lessons",
        }
    }
}

/// A prompt that must be answered with a JSON document matching `schema`.
///
/// The schema uses the OpenAPI subset accepted by Gemini's `responseSchema`
/// (uppercase type names). Providers without structured output embed it in
/// their instructions instead.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub kind: RequestKind,
    pub prompt: String,
    pub schema: serde_json::Value,
}

/// Prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Escape quotes and backslashes so document text cannot close the quoted
/// block it is embedded in.
fn sanitize_for_prompt(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn classify_request(text: &str) -> JsonRequest {
    let sample = sanitize_for_prompt(truncate_chars(text, CLASSIFY_SAMPLE_CHARS));
    JsonRequest {
        kind: RequestKind::Classify,
        prompt: format!(
            "Analyze the following study text and classify it. \
             Category must be one of: technical, theoretical, memorization, \
             problem_solving, general. Also return up to 8 keywords that \
             describe its main topics.\n\nText: \"{}\"",
            sample
        ),
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "category": {
                    "type": "STRING",
                    "enum": ["technical", "theoretical", "memorization", "problem_solving", "general"]
                },
                "keywords": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["category", "keywords"]
        }),
    }
}

pub fn title_request(text: &str) -> JsonRequest {
    let sample = sanitize_for_prompt(truncate_chars(text, TITLE_SAMPLE_CHARS));
    JsonRequest {
        kind: RequestKind::Title,
        prompt: format!(
            "Write a short, descriptive title (at most 8 words) for a study \
             session based on this text.\n\nText: \"{}\"",
            sample
        ),
        schema: json!({
            "type": "OBJECT",
            "properties": { "title": { "type": "STRING" } },
            "required": ["title"]
        }),
    }
}

pub fn lessons_request(text: &str, context: &AcademicContext) -> JsonRequest {
    let keywords = if context.keywords.is_empty() {
        "none".to_string()
    } else {
        context.keywords.join(", ")
    };
    JsonRequest {
        kind: RequestKind::Lessons,
        prompt: format!(
            "You are a tutor. The following text belongs to the \"{category}\" \
             category (keywords: {keywords}). Split it into 5 to 7 micro-lessons. \
             Each lesson has:\n\
             1. title\n\
             2. content: 2 or 3 short paragraphs\n\
             3. analogy: one everyday analogy\n\
             4. keyPoints: exactly 3 bullet points\n\
             5. checkQuestion: an open question with idealAnswer, concepts \
             (each an idea with a weight) and passingThreshold. Give core \
             concepts a high weight (around 0.6) and secondary ones a low \
             weight (around 0.2); weights do not need to sum to 1.0\n\
             6. advancedQuestion: optional harder question with the same shape\n\
             7. quizSeeds: 3 multiple-choice seeds with stem, answer and distractors\n\n\
             Text: \"{text}\"",
            category = context.category,
            keywords = keywords,
            text = sanitize_for_prompt(text),
        ),
        schema: lessons_schema(),
    }
}

fn question_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "question": { "type": "STRING" },
            "idealAnswer": { "type": "STRING" },
            "concepts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "idea": { "type": "STRING" },
                        "weight": { "type": "NUMBER" }
                    },
                    "required": ["idea", "weight"]
                }
            },
            "passingThreshold": { "type": "NUMBER" }
        },
        "required": ["question", "idealAnswer", "concepts"]
    })
}

fn lessons_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "lessons": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "content": { "type": "STRING" },
                        "analogy": { "type": "STRING" },
                        "keyPoints": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "checkQuestion": question_schema(),
                        "advancedQuestion": question_schema(),
                        "quizSeeds": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "stem": { "type": "STRING" },
                                    "answer": { "type": "STRING" },
                                    "distractors": { "type": "ARRAY", "items": { "type": "STRING" } }
                                },
                                "required": ["stem", "answer", "distractors"]
                            }
                        }
                    },
                    "required": ["title", "content", "keyPoints", "checkQuestion"]
                }
            }
        },
        "required": ["lessons"]
    })
}

/// Slice out the JSON document from a model answer, tolerating code fences
/// and chatter around it.
fn json_payload(raw: &str) -> Result<&str, AiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AiError::Malformed("empty response".to_string()));
    }
    let start = trimmed
        .find(['{', '['])
        .ok_or_else(|| AiError::Malformed("no JSON in response".to_string()))?;
    let end = trimmed
        .rfind(['}', ']'])
        .ok_or_else(|| AiError::Malformed("no JSON in response".to_string()))?;
    if end < start {
        return Err(AiError::Malformed("no JSON in response".to_string()));
    }
    Ok(&trimmed[start..=end])
}

pub fn parse_classification(raw: &str) -> Result<AcademicContext, AiError> {
    let context: AcademicContext = serde_json::from_str(json_payload(raw)?)?;
    Ok(context)
}

pub fn parse_title(raw: &str) -> Result<String, AiError> {
    #[derive(Deserialize)]
    struct TitleResponse {
        #[serde(default)]
        title: String,
    }

    let parsed: TitleResponse = serde_json::from_str(json_payload(raw)?)?;
    let title = parsed.title.trim().trim_matches('"').trim().to_string();
    if title.is_empty() {
        return Err(AiError::Malformed("empty title".to_string()));
    }
    Ok(title)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLesson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    analogy: String,
    #[serde(default)]
    key_points: Vec<String>,
    check_question: Option<CheckQuestion>,
    advanced_question: Option<CheckQuestion>,
    #[serde(default)]
    quiz_seeds: Vec<QuizSeed>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LessonsResponse {
    Wrapped { lessons: Vec<RawLesson> },
    Bare(Vec<RawLesson>),
}

/// Parse a lessons answer generated from `source_text`.
///
/// Every lesson gets a fresh id and a [`QuizContext`] built from the chunk it
/// came from. Lessons without a title, content or check question are dropped.
pub fn parse_lessons(raw: &str, source_text: &str) -> Result<Vec<MicroLesson>, AiError> {
    let raw_lessons = match serde_json::from_str::<LessonsResponse>(json_payload(raw)?)? {
        LessonsResponse::Wrapped { lessons } => lessons,
        LessonsResponse::Bare(lessons) => lessons,
    };

    let total = raw_lessons.len();
    let lessons: Vec<MicroLesson> = raw_lessons
        .into_iter()
        .filter_map(|lesson| {
            let title = lesson.title.trim().to_string();
            let content = lesson.content.trim().to_string();
            if title.is_empty() || content.is_empty() {
                return None;
            }
            let check_question = lesson.check_question?;
            Some(MicroLesson {
                id: Uuid::new_v4().to_string(),
                quiz_context: Some(QuizContext {
                    lesson_title: title.clone(),
                    cleaned_text: source_text.to_string(),
                    key_points: lesson.key_points.clone(),
                    quiz_seeds: lesson.quiz_seeds,
                }),
                title,
                content,
                analogy: lesson.analogy,
                key_points: lesson.key_points,
                check_question,
                advanced_question: lesson.advanced_question,
            })
        })
        .collect();

    if lessons.len() < total {
        tracing::debug!(
            dropped = total - lessons.len(),
            "Dropped incomplete lessons from model answer"
        );
    }
    Ok(lessons)
}
