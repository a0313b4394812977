use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractError;

/// A PDF handed to the pipeline, either on disk or already in memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name (for display and safe-mode titles)
    pub name: String,
    data: SourceData,
}

#[derive(Debug, Clone)]
enum SourceData {
    File(PathBuf),
    Memory(Arc<Vec<u8>>),
}

impl SourceDocument {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown.pdf".to_string());
        Self {
            name,
            data: SourceData::File(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: SourceData::Memory(Arc::new(bytes)),
        }
    }

    /// Read the document as binary.
    pub fn read_bytes(&self) -> Result<Arc<Vec<u8>>, ExtractError> {
        match &self.data {
            SourceData::File(path) => std::fs::read(path)
                .map(Arc::new)
                .map_err(|e| ExtractError::Io(format!("Failed to read PDF file: {}", e))),
            SourceData::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Result of extracting text from a PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Extracted text, pages joined by a single space
    pub text: String,
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Whether the trailer declares an encryption dictionary
    pub encrypted: bool,
}

/// Turns a PDF into raw text.
///
/// Implementations must honour `cancel` before opening the document, right
/// after it loads, and before every page, and report cancellation as
/// [`ExtractError::Aborted`] rather than a generic failure.
#[async_trait]
pub trait PdfParser: Send + Sync {
    async fn extract(
        &self,
        source: &SourceDocument,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError>;
}

/// Parser backed by lopdf, run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfParser;

#[async_trait]
impl PdfParser for LopdfParser {
    async fn extract(
        &self,
        source: &SourceDocument,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError> {
        if cancel.is_cancelled() {
            return Err(ExtractError::Aborted);
        }

        let source = source.clone();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            let bytes = source.read_bytes()?;
            extract_text_from_bytes(&bytes, &token)
        });

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ExtractError::Aborted),

            joined = task => match joined {
                Ok(result) => result,
                Err(e) => Err(ExtractError::Io(format!("Extraction task failed: {}", e))),
            },
        }
    }
}

/// Extract text from PDF bytes, page by page.
pub fn extract_text_from_bytes(
    pdf_bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<ExtractedDocument, ExtractError> {
    if cancel.is_cancelled() {
        return Err(ExtractError::Aborted);
    }

    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ExtractError::Io(format!("Failed to parse PDF: {}", e)))?;

    if cancel.is_cancelled() {
        return Err(ExtractError::Aborted);
    }

    let encrypted = doc.trailer.get(b"Encrypt").is_ok();

    // BTreeMap keys, already in page order
    let pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    let page_count = pages.len();

    let mut page_texts = Vec::with_capacity(page_count);
    for page_num in &pages {
        if cancel.is_cancelled() {
            tracing::debug!(page = page_num, "Extraction aborted between pages");
            return Err(ExtractError::Aborted);
        }
        let page_text = doc.extract_text(&[*page_num]).unwrap_or_default();
        let page_text = page_text.trim();
        if !page_text.is_empty() {
            page_texts.push(page_text.to_string());
        }
    }

    let text = page_texts.join(" ");

    tracing::debug!(
        chars = text.len(),
        pages = page_count,
        encrypted,
        "Extracted PDF text"
    );

    Ok(ExtractedDocument {
        text,
        page_count,
        encrypted,
    })
}
