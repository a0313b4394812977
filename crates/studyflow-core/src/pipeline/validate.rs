use super::types::ValidationWarning;
use crate::config::PipelineSettings;
use crate::pdf::ExtractedDocument;
use crate::text::char_len;

/// Heuristics run on freshly extracted text, in display order.
pub fn validate(doc: &ExtractedDocument, settings: &PipelineSettings) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let chars = char_len(&doc.text);
    if chars < settings.min_text_chars {
        warnings.push(ValidationWarning::ShortText { chars });
    }
    if doc.encrypted {
        warnings.push(ValidationWarning::Encrypted);
    }
    if doc.page_count > settings.max_pages {
        warnings.push(ValidationWarning::TooManyPages {
            pages: doc.page_count,
        });
    }

    warnings
}
