//! PDF text extraction.

mod extractor;

pub use extractor::{
    extract_text_from_bytes, ExtractedDocument, LopdfParser, PdfParser, SourceDocument,
};

#[cfg(test)]
pub(crate) use extractor::tests::create_multipage_pdf;
