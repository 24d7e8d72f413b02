//! The structured shape of one RFP analysis.
//!
//! Deserialization is deliberately lenient: models return `null`, numbers, or
//! objects where strings are expected, and omit whole sections. Anything that
//! cannot be filled ends up as [`NOT_SPECIFIED`] or an empty list, never as a guess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use crate::llm_client::prompts::NOT_SPECIFIED;

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub metadata: AnalysisMetadata,
    #[serde(default)]
    pub overview: Overview,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub evaluation: Evaluation,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default, deserialize_with = "lenient_list")]
    pub questions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub opportunities: Vec<String>,
    /// Full model output, kept only when structured parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Filled in by the engine, not by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub proposal_name: String,
    #[serde(default)]
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub organization: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub due_date: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub project_summary: String,
}

impl Default for Overview {
    fn default() -> Self {
        Self {
            title: not_specified(),
            organization: not_specified(),
            due_date: not_specified(),
            project_summary: not_specified(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    #[serde(default, deserialize_with = "lenient_list")]
    pub functional: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub technical: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub compliance: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub deliverables: Vec<String>,
}

impl Requirements {
    /// (key, heading, items) in the fixed order every artifact uses.
    pub fn sections(&self) -> [(&'static str, &'static str, &[String]); 4] {
        [
            ("functional", "Functional Requirements", self.functional.as_slice()),
            ("technical", "Technical Requirements", self.technical.as_slice()),
            ("compliance", "Compliance Requirements", self.compliance.as_slice()),
            ("deliverables", "Deliverables", self.deliverables.as_slice()),
        ]
    }

    pub fn total(&self) -> usize {
        self.sections().iter().map(|(_, _, items)| items.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(default, deserialize_with = "lenient_list")]
    pub criteria: Vec<String>,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub scoring_method: String,
}

impl Default for Evaluation {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            scoring_method: not_specified(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub budget: String,
    #[serde(default = "not_specified", deserialize_with = "lenient_string")]
    pub timeline: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub other: Vec<String>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            budget: not_specified(),
            timeline: not_specified(),
            other: Vec::new(),
        }
    }
}

impl Analysis {
    /// Replaces blank text fields with the sentinel and drops blank list items.
    pub fn fill_unspecified(&mut self) {
        for field in [
            &mut self.overview.title,
            &mut self.overview.organization,
            &mut self.overview.due_date,
            &mut self.overview.project_summary,
            &mut self.evaluation.scoring_method,
            &mut self.constraints.budget,
            &mut self.constraints.timeline,
        ] {
            if field.trim().is_empty() {
                *field = not_specified();
            } else {
                *field = field.trim().to_string();
            }
        }
        for list in [
            &mut self.requirements.functional,
            &mut self.requirements.technical,
            &mut self.requirements.compliance,
            &mut self.requirements.deliverables,
            &mut self.evaluation.criteria,
            &mut self.constraints.other,
            &mut self.questions,
            &mut self.opportunities,
        ] {
            list.retain(|item| !item.trim().is_empty());
            for item in list.iter_mut() {
                *item = item.trim().to_string();
            }
        }
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["requirement", "text", "description", "name", "title"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()).map(String::from))
            .or_else(|| Some(value.to_string())),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join("; "),
        ),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value).unwrap_or_else(not_specified))
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        other => value_to_text(&other).into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_default_to_not_specified() {
        let analysis: Analysis = serde_json::from_str("{}").unwrap();
        assert_eq!(analysis.overview.title, NOT_SPECIFIED);
        assert_eq!(analysis.overview.project_summary, NOT_SPECIFIED);
        assert_eq!(analysis.constraints.budget, NOT_SPECIFIED);
        assert_eq!(analysis.requirements.total(), 0);
    }

    #[test]
    fn test_lenient_fields_accept_nulls_numbers_and_objects() {
        let json = r#"{
            "overview": {"title": null, "organization": "Acme Corp", "dueDate": 20250101},
            "requirements": {
                "functional": [{"requirement": "Must support SSO"}, "Audit log", null],
                "technical": "Runs on Linux"
            }
        }"#;
        let analysis: Analysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.overview.title, NOT_SPECIFIED);
        assert_eq!(analysis.overview.due_date, "20250101");
        assert_eq!(
            analysis.requirements.functional,
            vec!["Must support SSO", "Audit log"]
        );
        assert_eq!(analysis.requirements.technical, vec!["Runs on Linux"]);
    }

    #[test]
    fn test_fill_unspecified_replaces_blanks() {
        let mut analysis = Analysis::default();
        analysis.overview.organization = "  ".to_string();
        analysis.requirements.functional = vec![" SSO ".to_string(), "".to_string()];
        analysis.fill_unspecified();
        assert_eq!(analysis.overview.organization, NOT_SPECIFIED);
        assert_eq!(analysis.requirements.functional, vec!["SSO"]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(Analysis::default()).unwrap();
        assert!(value["overview"].get("projectSummary").is_some());
        assert!(value["metadata"].get("sourceFile").is_some());
        assert!(value.get("rawResponse").is_none());
    }
}
