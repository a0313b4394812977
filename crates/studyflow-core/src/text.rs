//! Text cleanup applied to extracted PDF text before it reaches any model.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n?").unwrap());
static LEADING_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]+").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

/// Normalize raw PDF text.
///
/// - `ﬁ`/`ﬂ` ligatures become `fi`/`fl`
/// - line endings become `\n`
/// - leading spaces and tabs are stripped from every line
/// - runs of spaces/tabs collapse to one space
/// - three or more newlines collapse to a paragraph break (`\n\n`)
/// - the result is trimmed
///
/// Applying it twice gives the same result as applying it once.
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace('\u{FB01}', "fi").replace('\u{FB02}', "fl");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = LEADING_BLANKS.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, " ");
    let text = NEWLINE_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Split text into pieces of roughly `max_chars` bytes, breaking on sentence
/// boundaries. Text that already fits is returned as a single chunk.
///
/// A single sentence longer than `max_chars` becomes its own chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in SENTENCE.find_iter(text).map(|m| m.as_str()) {
        if current.len() + sentence.len() > max_chars {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            current = sentence.to_string();
        } else {
            current.push_str(sentence);
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

/// Number of Unicode scalar values, used for user-facing length thresholds.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLES: &[&str] = &[
        "",
        "plain",
        "  leading spaces\n\ttabbed line",
        "a\n\n\n\n\nb",
        "a\r\n\r\n\r\n\r\nb",
        "word    word\t\tword",
        "   \n   \n   \n text",
        "\u{FB01}nance and \u{FB02}ow",
        "para one.\n\npara two.\n   \n\n\n  para three  ",
        "mixed \t \t blanks\n \n \n \nend",
        "\r\r\rcarriage only",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize_text(sample);
            let twice = normalize_text(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    /// Text built from the characters normalization rewrites
    fn pdf_like_text() -> impl Strategy<Value = String> {
        "[a-z. \t\r\n\u{A0}\u{FB01}\u{FB02}]{0,80}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn normalize_twice_equals_once(raw in pdf_like_text()) {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn normalize_twice_equals_once_any_unicode(raw in any::<String>()) {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }
    }

    #[test]
    fn test_collapses_newline_runs_to_paragraph_break() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_text("a\n\nb"), "a\n\nb");
        assert_eq!(normalize_text("a\nb"), "a\nb");
    }

    #[test]
    fn test_collapses_blank_runs() {
        assert_eq!(normalize_text("word    word\t\tword"), "word word word");
    }

    #[test]
    fn test_strips_leading_whitespace_per_line() {
        assert_eq!(
            normalize_text("first\n    second\n\tthird"),
            "first\nsecond\nthird"
        );
    }

    #[test]
    fn test_whitespace_only_lines_become_paragraph_breaks() {
        assert_eq!(normalize_text("a\n   \n   \n   \nb"), "a\n\nb");
    }

    #[test]
    fn test_fixes_ligatures() {
        assert_eq!(normalize_text("\u{FB01}nance \u{FB02}ow"), "finance flow");
    }

    #[test]
    fn test_normalizes_line_endings() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_chunk_text_fits_in_one() {
        let chunks = chunk_text("Short text. Still short.", 100);
        assert_eq!(chunks, vec!["Short text. Still short.".to_string()]);
    }

    #[test]
    fn test_chunk_text_respects_sentences() {
        let text = "One sentence here. Another sentence there! A question now? Final words.";
        let chunks = chunk_text(text, 40);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.ends_with('.') || chunk.ends_with('!') || chunk.ends_with('?'),
                "chunk split mid-sentence: {:?}",
                chunk
            );
        }
        let rejoined: String = chunks.join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_chunk_text_oversized_sentence() {
        let long = "x".repeat(50);
        let chunks = chunk_text(&format!("{}. tail.", long), 20);
        assert_eq!(chunks[0], format!("{}.", long));
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("áé"), 2);
    }
}
