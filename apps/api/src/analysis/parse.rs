//! Turning raw model output into an [`Analysis`].

use crate::analysis::models::{Analysis, Overview, Requirements, NOT_SPECIFIED};
use crate::extraction::normalize::document_title;
use crate::llm_client::strip_json_fences;

/// Length (in chars) of the raw-output prefix carried by a degraded analysis.
pub const DEGRADED_SUMMARY_CHARS: usize = 1000;

pub const SEE_FULL_TEXT: &str = "See full analysis text";

/// The substring from the first `{` through the last `}`.
pub fn locate_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_analysis(raw: &str) -> Result<Analysis, serde_json::Error> {
    let text = strip_json_fences(raw);
    let json = locate_json_object(text).unwrap_or(text);
    let mut analysis: Analysis = serde_json::from_str(json)?;
    analysis.fill_unspecified();
    Ok(analysis)
}

/// Minimal analysis built from unparseable output. Structure is traded for
/// availability: the summary carries a prefix of the raw text and every
/// requirement list points back at it.
pub fn degraded_analysis(raw: &str, filename: &str) -> Analysis {
    let summary: String = raw.chars().take(DEGRADED_SUMMARY_CHARS).collect();
    let pointer = || vec![SEE_FULL_TEXT.to_string()];
    let mut analysis = Analysis {
        overview: Overview {
            title: document_title(filename),
            organization: NOT_SPECIFIED.to_string(),
            due_date: NOT_SPECIFIED.to_string(),
            project_summary: if summary.trim().is_empty() {
                NOT_SPECIFIED.to_string()
            } else {
                summary
            },
        },
        requirements: Requirements {
            functional: pointer(),
            technical: pointer(),
            compliance: pointer(),
            deliverables: pointer(),
        },
        raw_response: Some(raw.to_string()),
        ..Analysis::default()
    };
    analysis.metadata.degraded = true;
    analysis
}
