//! Content extraction: uploaded bytes to plain text.
//!
//! Extraction never fails past this module. Every failure mode (unsupported
//! format, parser error, parser panic, undecodable bytes) degrades to a
//! placeholder body so the rest of the pipeline always has text to work with.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

pub mod formats;
pub mod normalize;

pub use formats::{DocxExtractor, PdfExtractor, PlaceholderExtractor, PlainTextExtractor, Utf8Extractor};
pub use normalize::ExtractedText;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("content is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    #[error("document contains no extractable text")]
    Empty,
}

/// One format-specific text extractor, selected by capability lookup.
pub trait ContentExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, media_type: &str, filename: &str) -> bool;

    fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError>;

    /// Output is the upload itself and is kept even when it is blank.
    fn passes_through(&self) -> bool {
        false
    }
}

/// Ordered set of extractors. The first one whose `can_handle` accepts the
/// document wins; `Utf8Extractor` is the catch-all when nothing else matches.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn ContentExtractor>>,
    fallback: Arc<dyn ContentExtractor>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: Arc::new(Utf8Extractor),
        }
    }

    pub fn register(&mut self, extractor: Arc<dyn ContentExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn select(&self, media_type: &str, filename: &str) -> &Arc<dyn ContentExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(media_type, filename))
            .unwrap_or(&self.fallback)
    }

    /// Extracts text from `data`. Always returns a non-empty string, except
    /// for pass-through formats, whose text comes back exactly as uploaded.
    pub fn extract(&self, data: &[u8], filename: &str, media_type: &str) -> String {
        let extractor = self.select(media_type, filename);
        debug!(
            extractor = extractor.name(),
            filename, media_type, size = data.len(), "extracting document text"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| extractor.extract(data, filename)));
        match outcome {
            Ok(Ok(text)) if extractor.passes_through() || !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!(filename, "extracted text is empty, using placeholder");
                placeholder_body(filename, data.len(), &ExtractionError::Empty.to_string())
            }
            Ok(Err(e)) => {
                warn!(filename, extractor = extractor.name(), "extraction failed: {e}");
                placeholder_body(filename, data.len(), &e.to_string())
            }
            Err(_) => {
                warn!(filename, extractor = extractor.name(), "extractor panicked");
                placeholder_body(filename, data.len(), "the document parser crashed")
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainTextExtractor));
        registry.register(Arc::new(PdfExtractor));
        registry.register(Arc::new(DocxExtractor));
        registry.register(Arc::new(PlaceholderExtractor::legacy_word()));
        registry
    }
}

/// Placeholder body used whenever real text cannot be produced.
pub fn placeholder_body(filename: &str, size: usize, reason: &str) -> String {
    format!(
        "# {filename}\n\n\
        > Text could not be extracted automatically from this document ({size} bytes): {reason}.\n\
        > Manual conversion to plain text or markdown is recommended before analysis.\n"
    )
}

pub(crate) fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Best guess at a media type when the client did not declare a useful one.
pub fn guess_media_type(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "md" | "markdown" => "text/markdown",
        "txt" | "text" => "text/plain",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        _ => "application/octet-stream",
    }
}

/// Picks the declared type unless it is missing or the generic binary type.
pub fn resolve_media_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(t) if !t.is_empty() && t != "application/octet-stream" => t.to_string(),
        _ => guess_media_type(filename).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingExtractor;

    impl ContentExtractor for PanickingExtractor {
        fn name(&self) -> &'static str {
            "panics"
        }
        fn can_handle(&self, media_type: &str, _filename: &str) -> bool {
            media_type == "application/x-boom"
        }
        fn extract(&self, _data: &[u8], _filename: &str) -> Result<String, ExtractionError> {
            panic!("parser bug")
        }
    }

    #[test]
    fn test_plain_text_is_identity() {
        let registry = ExtractorRegistry::default();
        let text = "Organization: Acme Corp.\nRequirement: must support SSO.\n";
        assert_eq!(registry.extract(text.as_bytes(), "rfp.txt", "text/plain"), text);
        assert_eq!(
            registry.extract(text.as_bytes(), "rfp.md", "text/markdown"),
            text
        );
    }

    #[test]
    fn test_blank_plain_text_is_kept_as_is() {
        let registry = ExtractorRegistry::default();
        assert_eq!(registry.extract(b"  \n", "blank.txt", "text/plain"), "  \n");
        let body = registry.extract(b"  \n", "blank.xyz", "application/x-unknown");
        assert!(body.contains("no extractable text"));
    }

    #[test]
    fn test_unparseable_binary_returns_placeholder_with_filename() {
        let registry = ExtractorRegistry::default();
        let body = registry.extract(b"%PDF-1.4 garbage", "tender.pdf", "application/pdf");
        assert!(!body.is_empty());
        assert!(body.contains("tender.pdf"));
        assert!(body.contains("Manual conversion"));
    }

    #[test]
    fn test_legacy_word_returns_placeholder() {
        let registry = ExtractorRegistry::default();
        let body = registry.extract(&[0xD0, 0xCF, 0x11, 0xE0], "old.doc", "application/msword");
        assert!(body.contains("old.doc"));
        assert!(body.contains("4 bytes"));
    }

    #[test]
    fn test_unknown_type_decodes_utf8_or_explains() {
        let registry = ExtractorRegistry::default();
        assert_eq!(
            registry.extract(b"hello", "notes.xyz", "application/x-unknown"),
            "hello"
        );
        let body = registry.extract(&[0xff, 0xfe, 0x00], "blob.bin", "application/x-unknown");
        assert!(body.contains("blob.bin"));
        assert!(body.contains("UTF-8"));
    }

    #[test]
    fn test_panicking_extractor_degrades_to_placeholder() {
        let mut registry = ExtractorRegistry::empty();
        registry.register(Arc::new(PanickingExtractor));
        let body = registry.extract(b"x", "boom.bin", "application/x-boom");
        assert!(body.contains("boom.bin"));
    }

    #[test]
    fn test_resolve_media_type_prefers_declared() {
        assert_eq!(resolve_media_type(Some("text/plain"), "a.pdf"), "text/plain");
        assert_eq!(
            resolve_media_type(Some("application/octet-stream"), "a.pdf"),
            "application/pdf"
        );
        assert_eq!(resolve_media_type(None, "a.MD"), "text/markdown");
    }
}
