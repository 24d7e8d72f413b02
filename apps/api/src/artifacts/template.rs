//! Response template: structural scaffolding with named placeholders.
//!
//! Placeholders are `{{path.into.variables}}`. Repeated parts use
//! `{{#each list}} ... {{/each}}`, where `{{this}}`, `{{this.field}}` and
//! `{{@number}}` refer to the current element. Every requirement list gets an
//! iteration block over `responses.<list>`, so each requirement has exactly
//! one response slot.

use std::fmt::Write;

use crate::analysis::Analysis;

pub fn render_template(analysis: &Analysis) -> String {
    let mut t = String::new();

    let _ = writeln!(
        t,
        "<!-- Response template for {} (analysis of {}) -->\n",
        inert(&analysis.overview.title),
        inert(&analysis.metadata.source_file)
    );
    t.push_str("# Response to {{overview.title}}\n\n");
    t.push_str("**Prepared for:** {{overview.organization}}\n\n");
    t.push_str("**Submission due:** {{overview.dueDate}}\n\n");

    t.push_str("## 1. Executive Summary\n\n{{executiveSummary}}\n\n");

    t.push_str("## 2. Understanding of Requirements\n\n{{overview.projectSummary}}\n\n");
    for (index, (key, heading, _)) in analysis.requirements.sections().iter().enumerate() {
        let _ = writeln!(t, "### 2.{} {}\n", index + 1, heading);
        let _ = writeln!(t, "{{{{#each responses.{key}}}}}");
        t.push_str("**{{@number}}. {{this.requirement}}**\n\n{{this.response}}\n\n");
        t.push_str("{{/each}}\n");
    }

    t.push_str("## 3. Proposed Solution\n\n");
    t.push_str("### 3.1 Approach\n\n{{solution.approach}}\n\n");
    t.push_str("### 3.2 Architecture\n\n{{solution.architecture}}\n\n");
    t.push_str("### 3.3 Implementation Plan\n\n{{solution.implementationPlan}}\n\n");
    t.push_str("**Timeline constraint:** {{constraints.timeline}}\n\n");

    t.push_str("## 4. Team\n\n");
    t.push_str("{{#each team}}\n- **{{this.name}}**, {{this.role}}: {{this.experience}}\n{{/each}}\n\n");

    t.push_str("## 5. Budget\n\n");
    t.push_str("{{#each budget.items}}\n- {{this.description}}: {{this.cost}}\n{{/each}}\n\n");
    t.push_str("**Total:** {{budget.total}}\n\n");
    t.push_str("**Budget constraint:** {{constraints.budget}}\n\n");

    t.push_str("## 6. Risk Management\n\n");
    t.push_str("{{#each risks}}\n- **{{this.risk}}**: {{this.mitigation}}\n{{/each}}\n\n");

    t.push_str("## 7. Why Choose Us\n\n");
    t.push_str("{{#each differentiators}}\n- {{this.differentiator}}\n{{/each}}\n");

    t
}

/// Breaks up placeholder and comment delimiters in literal text so the
/// renderer and markdown readers treat it as plain text.
fn inert(text: &str) -> String {
    text.replace("{{", "{ {")
        .replace("}}", "} }")
        .replace("-->", "-- >")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::sample_analysis;

    #[test]
    fn test_every_requirement_list_has_an_iteration_block() {
        let template = render_template(&sample_analysis());
        for key in ["functional", "technical", "compliance", "deliverables"] {
            assert!(
                template.contains(&format!("{{{{#each responses.{key}}}}}")),
                "missing block for {key}"
            );
        }
        assert_eq!(template.matches("{{#each").count(), template.matches("{{/each}}").count());
    }

    #[test]
    fn test_template_mirrors_section_structure() {
        let template = render_template(&Analysis::default());
        let order = [
            "## 1. Executive Summary",
            "## 2. Understanding of Requirements",
            "## 3. Proposed Solution",
            "## 4. Team",
            "## 5. Budget",
            "## 6. Risk Management",
        ];
        let positions: Vec<_> = order.iter().map(|h| template.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_title_with_placeholder_syntax_still_renders() {
        let mut analysis = sample_analysis();
        analysis.overview.title = "Portal {{#each vendors}} integration".to_string();
        analysis.metadata.source_file = "notes --> {{/each}}.txt".to_string();
        let set = crate::artifacts::assemble(&analysis).unwrap();

        let rendered = crate::artifacts::render::render(&set.template, &set.variables).unwrap();
        assert!(rendered.contains("# Response to Portal {{#each vendors}} integration"));
        assert_eq!(set.template.matches("-->").count(), 1);
    }
}
