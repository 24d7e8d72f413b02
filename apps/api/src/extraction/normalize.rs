use std::path::Path;

use serde::{Deserialize, Serialize};

/// Normalized markdown body of one document, tagged with the cache key it was stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub filename: String,
    pub body: String,
    pub cache_key: String,
}

impl ExtractedText {
    /// Normalizes line endings and guarantees the body opens with a top-level heading.
    pub fn from_raw(filename: &str, raw: &str, cache_key: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            body: normalize_markdown(filename, raw),
            cache_key: cache_key.into(),
        }
    }
}

pub fn normalize_markdown(filename: &str, raw: &str) -> String {
    let body = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut body = drop_leading_blank_lines(body.trim_start_matches('\u{feff}')).to_string();

    if !starts_with_top_heading(&body) {
        body = format!("# {}\n\n{}", document_title(filename), body);
    }
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body
}

fn drop_leading_blank_lines(body: &str) -> &str {
    let mut rest = body;
    while let Some(end) = rest.find('\n') {
        if !rest[..end].trim().is_empty() {
            break;
        }
        rest = &rest[end + 1..];
    }
    if rest.trim().is_empty() {
        ""
    } else {
        rest
    }
}

fn starts_with_top_heading(body: &str) -> bool {
    body.lines()
        .next()
        .map(|line| line.trim_start().starts_with("# "))
        .unwrap_or(false)
}

/// `rfp_2025-final.pdf` becomes `rfp 2025-final`.
pub fn document_title(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let title = stem.replace('_', " ");
    if title.trim().is_empty() {
        "Untitled document".to_string()
    } else {
        title.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepends_title_heading_when_missing() {
        let text = ExtractedText::from_raw("acme_rfp.txt", "Organization: Acme Corp.", "k");
        assert_eq!(text.body, "# acme rfp\n\nOrganization: Acme Corp.\n");
    }

    #[test]
    fn test_keeps_existing_heading() {
        let body = normalize_markdown("x.md", "# Tender\n\nBody\n");
        assert_eq!(body, "# Tender\n\nBody\n");
    }

    #[test]
    fn test_blank_lines_before_heading_are_dropped() {
        let body = normalize_markdown("x.md", "\n  \n\t\n# Tender\n\nBody\n");
        assert_eq!(body, "# Tender\n\nBody\n");
        let body = normalize_markdown("x.md", "\r\n\r\nIntro\n");
        assert_eq!(body, "# x\n\nIntro\n");
    }

    #[test]
    fn test_blank_document_gets_title_only() {
        assert_eq!(normalize_markdown("blank.txt", "  \n\n"), "# blank\n\n");
    }

    #[test]
    fn test_second_level_heading_is_not_enough() {
        let body = normalize_markdown("scope.md", "## Scope\n");
        assert!(body.starts_with("# scope\n\n## Scope"));
    }

    #[test]
    fn test_crlf_is_normalized() {
        let body = normalize_markdown("a.txt", "# A\r\nline\r\n");
        assert_eq!(body, "# A\nline\n");
    }

    #[test]
    fn test_document_title_fallback() {
        assert_eq!(document_title(".pdf"), ".pdf");
        assert_eq!(document_title("   .txt"), "Untitled document");
    }
}
