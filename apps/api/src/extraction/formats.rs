use super::{extension, placeholder_body, ContentExtractor, ExtractionError};

/// Markdown and plain text pass through unchanged (lossy UTF-8 re-encoding).
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn can_handle(&self, media_type: &str, filename: &str) -> bool {
        let media_type = media_type.split(';').next().unwrap_or("").trim();
        matches!(
            media_type,
            "text/plain" | "text/markdown" | "text/x-markdown"
        ) || matches!(extension(filename).as_str(), "txt" | "text" | "md" | "markdown")
    }

    fn extract(&self, data: &[u8], _filename: &str) -> Result<String, ExtractionError> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    fn passes_through(&self) -> bool {
        true
    }
}

pub struct PdfExtractor;

impl ContentExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn can_handle(&self, media_type: &str, filename: &str) -> bool {
        media_type == "application/pdf" || extension(filename) == "pdf"
    }

    fn extract(&self, data: &[u8], _filename: &str) -> Result<String, ExtractionError> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        // Scanned PDFs come back as form feeds and whitespace only.
        if text.trim_matches(|c: char| c.is_whitespace() || c == '\x0C').is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text)
    }
}

/// OOXML Word documents. Paragraph runs are joined, one paragraph per line.
pub struct DocxExtractor;

impl ContentExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx-rs"
    }

    fn can_handle(&self, media_type: &str, filename: &str) -> bool {
        media_type == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            || extension(filename) == "docx"
    }

    fn extract(&self, data: &[u8], _filename: &str) -> Result<String, ExtractionError> {
        use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};

        let docx = read_docx(data).map_err(|e| ExtractionError::Docx(e.to_string()))?;

        let mut lines: Vec<String> = Vec::new();
        for child in docx.document.children.iter() {
            if let DocumentChild::Paragraph(para) = child {
                let line: String = para
                    .children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect();
                if !line.trim().is_empty() {
                    lines.push(line);
                }
            }
        }
        Ok(lines.join("\n"))
    }
}

/// Formats we accept but cannot parse. Emits a placeholder noting the size.
pub struct PlaceholderExtractor {
    media_types: &'static [&'static str],
    extensions: &'static [&'static str],
    format_name: &'static str,
}

impl PlaceholderExtractor {
    pub fn legacy_word() -> Self {
        Self {
            media_types: &["application/msword"],
            extensions: &["doc"],
            format_name: "legacy Word",
        }
    }
}

impl ContentExtractor for PlaceholderExtractor {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn can_handle(&self, media_type: &str, filename: &str) -> bool {
        self.media_types.contains(&media_type)
            || self.extensions.contains(&extension(filename).as_str())
    }

    fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError> {
        Ok(placeholder_body(
            filename,
            data.len(),
            &format!("{} files are not parsed", self.format_name),
        ))
    }
}

/// Catch-all: strict UTF-8 decode.
pub struct Utf8Extractor;

impl ContentExtractor for Utf8Extractor {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn can_handle(&self, _media_type: &str, _filename: &str) -> bool {
        true
    }

    fn extract(&self, data: &[u8], _filename: &str) -> Result<String, ExtractionError> {
        Ok(std::str::from_utf8(data)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        use docx_rs::{Docx, Paragraph, Run};
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_plain_text_matches_by_media_type_or_extension() {
        assert!(PlainTextExtractor.can_handle("text/plain; charset=utf-8", "x"));
        assert!(PlainTextExtractor.can_handle("application/octet-stream", "rfp.md"));
        assert!(!PlainTextExtractor.can_handle("application/pdf", "rfp.pdf"));
    }

    #[test]
    fn test_plain_text_reencodes_invalid_bytes_lossily() {
        let out = PlainTextExtractor.extract(b"ok \xff end", "a.txt").unwrap();
        assert!(out.starts_with("ok "));
        assert!(out.ends_with(" end"));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let bytes = build_docx(&["Request for Proposal", "Due date: 2025-01-01"]);
        let text = DocxExtractor.extract(&bytes, "rfp.docx").unwrap();
        assert_eq!(text, "Request for Proposal\nDue date: 2025-01-01");
    }

    #[test]
    fn test_docx_rejects_garbage() {
        assert!(matches!(
            DocxExtractor.extract(b"not a zip", "rfp.docx"),
            Err(ExtractionError::Docx(_))
        ));
    }

    #[test]
    fn test_utf8_extractor_rejects_invalid_bytes() {
        assert!(matches!(
            Utf8Extractor.extract(&[0xc3, 0x28], "x"),
            Err(ExtractionError::Decode(_))
        ));
    }
}
