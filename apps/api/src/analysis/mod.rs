// RFP analysis: prompt the text-generation service, fall back across the
// configured model list, parse structured output with a degraded textual fallback.

pub mod engine;
pub mod models;
pub mod parse;
pub mod prompts;

pub use engine::{AnalysisConfig, AnalysisEngine, AnalysisError};
pub use models::Analysis;
