use std::fmt::Write;

use crate::analysis::models::{Analysis, NOT_SPECIFIED};

fn numbered(md: &mut String, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(md, "{}. {}", i + 1, item);
    }
    md.push('\n');
}

fn specified(value: &str) -> bool {
    value != NOT_SPECIFIED
}

/// Markdown requirements summary. Sections whose source list is empty are left out.
pub fn render_requirements(analysis: &Analysis) -> String {
    let overview = &analysis.overview;
    let meta = &analysis.metadata;
    let mut md = String::new();

    let _ = writeln!(md, "# RFP Requirements Summary: {}\n", overview.title);
    let _ = writeln!(md, "- **Source document:** {}", meta.source_file);
    let _ = writeln!(
        md,
        "- **Analyzed:** {}",
        meta.analyzed_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(md, "- **Model:** {}\n", meta.model);

    if meta.degraded {
        md.push_str(
            "> The analysis could not be parsed into structured form. \
            The summary below is a prefix of the raw analysis, which is reproduced in full at the end.\n\n",
        );
    }

    md.push_str("## Overview\n\n");
    let _ = writeln!(md, "- **Title:** {}", overview.title);
    let _ = writeln!(md, "- **Issuing organization:** {}", overview.organization);
    let _ = writeln!(md, "- **Due date:** {}\n", overview.due_date);
    md.push_str("### Project Summary\n\n");
    let _ = writeln!(md, "{}\n", overview.project_summary);

    if analysis.requirements.total() > 0 {
        md.push_str("## Requirements\n\n");
        for (_, heading, items) in analysis.requirements.sections() {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(md, "### {heading}\n");
            numbered(&mut md, items);
        }
    }

    let evaluation = &analysis.evaluation;
    if !evaluation.criteria.is_empty() {
        md.push_str("## Evaluation Criteria\n\n");
        numbered(&mut md, &evaluation.criteria);
        if specified(&evaluation.scoring_method) {
            let _ = writeln!(md, "**Scoring method:** {}\n", evaluation.scoring_method);
        }
    }

    let constraints = &analysis.constraints;
    if specified(&constraints.budget)
        || specified(&constraints.timeline)
        || !constraints.other.is_empty()
    {
        md.push_str("## Constraints\n\n");
        let _ = writeln!(md, "- **Budget:** {}", constraints.budget);
        let _ = writeln!(md, "- **Timeline:** {}\n", constraints.timeline);
        if !constraints.other.is_empty() {
            md.push_str("### Other Constraints\n\n");
            numbered(&mut md, &constraints.other);
        }
    }

    if !analysis.questions.is_empty() {
        md.push_str("## Open Questions\n\n");
        numbered(&mut md, &analysis.questions);
    }

    if !analysis.opportunities.is_empty() {
        md.push_str("## Differentiation Opportunities\n\n");
        numbered(&mut md, &analysis.opportunities);
    }

    if let Some(raw) = &analysis.raw_response {
        md.push_str("## Full Analysis Text\n\n");
        md.push_str(raw.trim_end());
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::sample_analysis;

    #[test]
    fn test_lists_render_as_numbered_items() {
        let md = render_requirements(&sample_analysis());
        assert!(md.starts_with("# RFP Requirements Summary: Identity Platform Modernization"));
        assert!(md.contains("### Functional Requirements\n\n1. Must support SSO\n2. Audit logging\n"));
        assert!(md.contains("### Technical Requirements\n\n1. Runs on Linux\n"));
        assert!(md.contains("## Differentiation Opportunities"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let md = render_requirements(&sample_analysis());
        assert!(!md.contains("### Compliance Requirements"));
        assert!(!md.contains("### Deliverables"));
        assert!(!md.contains("## Open Questions"));
        assert!(!md.contains("## Constraints"));
    }

    #[test]
    fn test_all_empty_analysis_still_has_overview() {
        let md = render_requirements(&Analysis::default());
        assert!(md.contains("## Overview"));
        assert!(!md.contains("## Requirements"));
        assert!(!md.contains("## Evaluation Criteria"));
    }

    #[test]
    fn test_degraded_analysis_includes_raw_text() {
        let analysis = crate::analysis::parse::degraded_analysis("free-form answer", "rfp.txt");
        let md = render_requirements(&analysis);
        assert!(md.contains("could not be parsed"));
        assert!(md.contains("## Full Analysis Text\n\nfree-form answer\n"));
    }
}
