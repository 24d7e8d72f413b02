//! Analysis fallback engine.
//!
//! Walks the configured model list in order with an index cursor: one attempt
//! per model, the first raw response wins. A response that is not valid JSON
//! still wins, through the degraded path in [`crate::analysis::parse`]. The
//! engine fails only when every model has errored (or the deadline ran out).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::analysis::models::Analysis;
use crate::analysis::parse::{degraded_analysis, parse_analysis};
use crate::analysis::prompts::ANALYSIS_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_INSTRUCTION};
use crate::llm_client::TextGenerator;

/// Upper bound on document text embedded in one prompt.
const MAX_DOCUMENT_CHARS: usize = 200_000;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Priority order. Operators may reorder freely.
    pub models: Vec<String>,
    /// Bound on the whole iteration, across all models.
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no analysis models are configured")]
    NoModelsConfigured,

    #[error("all models failed ({} attempted): {}", .attempts.len(), summarize(.attempts))]
    AllModelsFailed { attempts: Vec<AttemptFailure> },
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.model, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone)]
pub struct AnalysisEngine {
    generator: Arc<dyn TextGenerator>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, config: AnalysisConfig) -> Self {
        Self { generator, config }
    }

    pub async fn analyze(
        &self,
        text: &str,
        filename: &str,
        proposal_name: &str,
    ) -> Result<Analysis, AnalysisError> {
        let models = &self.config.models;
        if models.is_empty() {
            return Err(AnalysisError::NoModelsConfigured);
        }

        let prompt = build_analysis_prompt(text, filename, proposal_name);
        let started = Instant::now();
        let mut attempts: Vec<AttemptFailure> = Vec::new();
        let mut cursor = 0;

        while cursor < models.len() {
            let model = &models[cursor];
            let remaining = self.config.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    "analysis deadline of {:?} reached before trying {model}",
                    self.config.deadline
                );
                attempts.push(AttemptFailure {
                    model: model.clone(),
                    error: "analysis deadline exceeded".to_string(),
                });
                break;
            }

            info!(
                model = %model,
                attempt = cursor + 1,
                of = models.len(),
                filename,
                "requesting RFP analysis"
            );
            match tokio::time::timeout(remaining, self.generator.generate(model, &prompt)).await {
                Ok(Ok(raw)) => return Ok(finish(&raw, model, filename, proposal_name)),
                Ok(Err(e)) => {
                    if e.is_quota() {
                        warn!(model = %model, "model quota exhausted, falling back: {e}");
                    } else {
                        warn!(model = %model, "model call failed, falling back: {e}");
                    }
                    attempts.push(AttemptFailure {
                        model: model.clone(),
                        error: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(model = %model, "model call timed out, falling back");
                    attempts.push(AttemptFailure {
                        model: model.clone(),
                        error: "timed out".to_string(),
                    });
                }
            }
            cursor += 1;
        }

        Err(AnalysisError::AllModelsFailed { attempts })
    }
}

fn finish(raw: &str, model: &str, filename: &str, proposal_name: &str) -> Analysis {
    let mut analysis = match parse_analysis(raw) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(model, filename, "analysis output is not valid JSON, degrading: {e}");
            degraded_analysis(raw, filename)
        }
    };
    analysis.metadata.source_file = filename.to_string();
    analysis.metadata.proposal_name = proposal_name.to_string();
    analysis.metadata.analyzed_at = Utc::now();
    analysis.metadata.model = model.to_string();
    info!(
        model,
        filename,
        requirements = analysis.requirements.total(),
        degraded = analysis.metadata.degraded,
        "RFP analysis complete"
    );
    analysis
}

pub fn build_analysis_prompt(text: &str, filename: &str, proposal_name: &str) -> String {
    let document_text: String = if text.chars().count() > MAX_DOCUMENT_CHARS {
        warn!(filename, "document text truncated to {MAX_DOCUMENT_CHARS} chars for analysis");
        text.chars().take(MAX_DOCUMENT_CHARS).collect()
    } else {
        text.to_string()
    };
    ANALYSIS_PROMPT_TEMPLATE
        .replace("{filename}", filename)
        .replace("{proposal_name}", proposal_name)
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{json_only_instruction}", JSON_ONLY_INSTRUCTION)
        // Last, so placeholders inside the document are left alone.
        .replace("{document_text}", &document_text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::models::NOT_SPECIFIED;
    use crate::analysis::parse::SEE_FULL_TEXT;
    use crate::llm_client::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a script in order and records which models were called.
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn called_models(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }
    }

    pub(crate) fn quota_error() -> LlmError {
        LlmError::Api {
            status: 429,
            message: "quota exceeded".to_string(),
        }
    }

    pub(crate) const ACME_ANALYSIS: &str = r#"{
        "overview": {
            "title": "Identity Platform Modernization",
            "organization": "Acme Corp",
            "dueDate": "2025-01-01",
            "projectSummary": "Acme Corp seeks a vendor to modernize sign-in."
        },
        "requirements": {
            "functional": ["Must support SSO"],
            "technical": [],
            "compliance": [],
            "deliverables": []
        },
        "evaluation": {"criteria": [], "scoringMethod": "Not specified in RFP"},
        "constraints": {"budget": "Not specified in RFP", "timeline": "Not specified in RFP", "other": []},
        "questions": [],
        "opportunities": []
    }"#;

    fn engine(generator: Arc<ScriptedGenerator>, models: &[&str]) -> AnalysisEngine {
        AnalysisEngine::new(
            generator,
            AnalysisConfig {
                models: models.iter().map(|m| m.to_string()).collect(),
                deadline: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn test_falls_back_until_first_success_and_stops() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(quota_error()),
            Err(LlmError::EmptyContent),
            Ok(ACME_ANALYSIS.to_string()),
            Ok("never used".to_string()),
        ]));
        let analysis = engine(generator.clone(), &["m1", "m2", "m3", "m4"])
            .analyze("Organization: Acme Corp.", "rfp.txt", "Acme bid")
            .await
            .unwrap();

        assert_eq!(generator.called_models(), vec!["m1", "m2", "m3"]);
        assert_eq!(analysis.metadata.model, "m3");
        assert_eq!(analysis.metadata.source_file, "rfp.txt");
        assert_eq!(analysis.metadata.proposal_name, "Acme bid");
        assert_eq!(analysis.overview.organization, "Acme Corp");
        assert_eq!(analysis.requirements.functional, vec!["Must support SSO"]);
        assert!(!analysis.metadata.degraded);
    }

    #[tokio::test]
    async fn test_all_models_failing_is_a_distinct_error() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(quota_error()),
            Err(quota_error()),
        ]));
        let err = engine(generator.clone(), &["m1", "m2"])
            .analyze("text", "rfp.txt", "bid")
            .await
            .unwrap_err();

        match err {
            AnalysisError::AllModelsFailed { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].model, "m1");
                assert_eq!(attempts[1].model, "m2");
            }
            other => panic!("expected AllModelsFailed, got {other:?}"),
        }
        assert_eq!(generator.called_models(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_invalid_json_degrades_instead_of_failing() {
        let raw = "The RFP is from Acme Corp and requires SSO. Due 2025-01-01.";
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(raw.to_string())]));
        let analysis = engine(generator, &["m1", "m2"])
            .analyze("text", "rfp.txt", "bid")
            .await
            .unwrap();

        assert!(analysis.metadata.degraded);
        assert!(raw.starts_with(&analysis.overview.project_summary));
        assert_eq!(analysis.requirements.functional, vec![SEE_FULL_TEXT]);
        assert_eq!(analysis.overview.organization, NOT_SPECIFIED);
        assert_eq!(analysis.metadata.model, "m1");
    }

    #[tokio::test]
    async fn test_empty_model_list_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let err = engine(generator.clone(), &[])
            .analyze("text", "rfp.txt", "bid")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoModelsConfigured));
        assert!(generator.called_models().is_empty());
    }

    #[test]
    fn test_prompt_embeds_document_and_contract() {
        let prompt = build_analysis_prompt("Requirement: must support SSO.", "rfp.txt", "Acme bid");
        assert!(prompt.contains("Requirement: must support SSO."));
        assert!(prompt.contains("Not specified in RFP"));
        assert!(prompt.contains("\"projectSummary\""));
        assert!(prompt.contains("Acme bid"));
        assert!(!prompt.contains("{document_text}"));
    }
}
