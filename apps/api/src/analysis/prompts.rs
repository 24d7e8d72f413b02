// Prompt templates for RFP analysis. The wording is configuration, not contract:
// only the JSON schema below is relied on by the parser.

/// Replace `{filename}`, `{proposal_name}`, `{grounding_instruction}`,
/// `{json_only_instruction}` and `{document_text}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are an expert proposal manager analyzing a Request for Proposal (RFP).

Proposal: {proposal_name}
Source document: {filename}

Analyze the RFP below and return a JSON object with this EXACT schema (no extra fields):
{
  "overview": {
    "title": "string",
    "organization": "string (the requesting organization)",
    "dueDate": "string",
    "projectSummary": "string (2-4 sentences)"
  },
  "requirements": {
    "functional": ["string"],
    "technical": ["string"],
    "compliance": ["string"],
    "deliverables": ["string"]
  },
  "evaluation": {
    "criteria": ["string"],
    "scoringMethod": "string"
  },
  "constraints": {
    "budget": "string",
    "timeline": "string",
    "other": ["string"]
  },
  "questions": ["string (open questions to ask the issuer)"],
  "opportunities": ["string (ways a bidder could differentiate)"]
}

{grounding_instruction}

{json_only_instruction}

RFP DOCUMENT:
{document_text}
"#;
