//! Word (.docx) rendering of a filled response.
//!
//! Handles the markdown subset the response template produces: `#`..`###`
//! headings, `-` bullets, numbered lines, `**bold**` spans and plain paragraphs.
//! HTML comments are dropped.

use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to build Word document: {0}")]
pub struct DocxError(String);

/// Half-point sizes for heading levels 1-3, then body text.
const HEADING_SIZES: [usize; 3] = [36, 30, 26];
const BODY_SIZE: usize = 22;

pub fn markdown_to_docx(markdown: &str) -> Result<Vec<u8>, DocxError> {
    let mut docx = Docx::new();

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with("<!--") && trimmed.ends_with("-->")) {
            continue;
        }
        docx = docx.add_paragraph(paragraph_for(trimmed));
    }

    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| DocxError(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn paragraph_for(line: &str) -> Paragraph {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=3).contains(&level) && line[level..].starts_with(' ') {
        let text = line[level..].trim().replace("**", "");
        return Paragraph::new().add_run(
            Run::new()
                .add_text(text)
                .bold()
                .size(HEADING_SIZES[level - 1]),
        );
    }

    let (prefix, body) = match line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        Some(rest) => ("\u{2022} ", rest),
        None => ("", line),
    };

    let mut paragraph = Paragraph::new();
    if !prefix.is_empty() {
        paragraph = paragraph.add_run(Run::new().add_text(prefix).size(BODY_SIZE));
    }
    // Odd-numbered segments between `**` markers are bold.
    for (i, segment) in body.split("**").enumerate() {
        if segment.is_empty() {
            continue;
        }
        let run = Run::new().add_text(segment).size(BODY_SIZE);
        paragraph = paragraph.add_run(if i % 2 == 1 { run.bold() } else { run });
    }
    paragraph
}
