//! Artifact assembly: one analysis in, the derived document set out.
//!
//! `assemble` is pure. It reads nothing from disk or network and depends on
//! nothing but the `Analysis` it is given, so two calls on the same instance
//! produce byte-identical output.

use serde_json::Value;

use crate::analysis::Analysis;
use crate::models::proposal::ArtifactKind;

pub mod docx;
pub mod render;
pub mod requirements;
pub mod template;
pub mod variables;

pub const SOURCE_MARKDOWN: &str = "rfp_source.md";
pub const ORGANIZATION_PROFILE: &str = "organization_profile.md";
pub const REQUIREMENTS: &str = "requirements.md";
pub const RESPONSE_TEMPLATE: &str = "response_template.md";
pub const VARIABLES: &str = "variables.json";
pub const WORD_DOCUMENT: &str = "proposal_response.docx";

/// Placeholder for anything the analysis could not supply.
pub const TO_BE_FILLED: &str = "[TO BE FILLED]";

/// (display name, kind) for a known artifact file name.
pub fn describe(name: &str) -> Option<(&'static str, ArtifactKind)> {
    match name {
        SOURCE_MARKDOWN => Some(("RFP source (markdown)", ArtifactKind::SourceMarkdown)),
        ORGANIZATION_PROFILE => Some((
            "Organization profile (markdown)",
            ArtifactKind::OrganizationProfile,
        )),
        REQUIREMENTS => Some(("Requirements summary", ArtifactKind::Requirements)),
        RESPONSE_TEMPLATE => Some(("Response template", ArtifactKind::ResponseTemplate)),
        VARIABLES => Some(("Response variables", ArtifactKind::Variables)),
        WORD_DOCUMENT => Some(("Proposal response (Word)", ArtifactKind::WordDocument)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub requirements: String,
    pub template: String,
    pub variables: Value,
}

impl ArtifactSet {
    /// The three files in write order, as (name, bytes).
    pub fn files(&self) -> Result<Vec<(&'static str, Vec<u8>)>, serde_json::Error> {
        let mut variables = serde_json::to_string_pretty(&self.variables)?;
        variables.push('\n');
        Ok(vec![
            (REQUIREMENTS, self.requirements.clone().into_bytes()),
            (RESPONSE_TEMPLATE, self.template.clone().into_bytes()),
            (VARIABLES, variables.into_bytes()),
        ])
    }
}

pub fn assemble(analysis: &Analysis) -> Result<ArtifactSet, serde_json::Error> {
    Ok(ArtifactSet {
        requirements: requirements::render_requirements(analysis),
        template: template::render_template(analysis),
        variables: variables::build_variables(analysis)?,
    })
}
