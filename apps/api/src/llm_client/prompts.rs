// Shared prompt fragments. Each module that calls the LLM keeps its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// Enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Sentinel for every field the model could not find in the source document.
pub const NOT_SPECIFIED: &str = "Not specified in RFP";

/// Forbids invented specifics.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Extract only what the document states. Do NOT infer, interpolate, or invent \
    names, dates, amounts or requirements. Every text field you cannot fill from the document \
    MUST be the exact string \"Not specified in RFP\". Lists you cannot fill MUST be empty arrays.";
