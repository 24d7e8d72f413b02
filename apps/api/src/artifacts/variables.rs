use serde_json::{json, Map, Value};

use crate::analysis::models::{Analysis, NOT_SPECIFIED};
use crate::artifacts::TO_BE_FILLED;

/// Nested variables document mirroring the analysis.
///
/// Known fields are copied verbatim. Everything else is a `[TO BE FILLED]`
/// placeholder, including one response slot per requirement, in order, so a
/// later fill step can zip responses back against the requirement text.
pub fn build_variables(analysis: &Analysis) -> Result<Value, serde_json::Error> {
    let mut responses = Map::new();
    for (key, _, items) in analysis.requirements.sections() {
        let slots: Vec<Value> = items
            .iter()
            .map(|requirement| json!({ "requirement": requirement, "response": TO_BE_FILLED }))
            .collect();
        responses.insert(key.to_string(), Value::Array(slots));
    }

    let differentiators: Vec<Value> = if analysis.opportunities.is_empty() {
        vec![json!({ "opportunity": NOT_SPECIFIED, "differentiator": TO_BE_FILLED })]
    } else {
        analysis
            .opportunities
            .iter()
            .map(|o| json!({ "opportunity": o, "differentiator": TO_BE_FILLED }))
            .collect()
    };

    let metadata = serde_json::to_value(&analysis.metadata)?;
    let overview = serde_json::to_value(&analysis.overview)?;
    let requirements = serde_json::to_value(&analysis.requirements)?;
    let evaluation = serde_json::to_value(&analysis.evaluation)?;
    let constraints = serde_json::to_value(&analysis.constraints)?;

    Ok(json!({
        "metadata": metadata,
        "overview": overview,
        "requirements": requirements,
        "evaluation": evaluation,
        "constraints": constraints,
        "executiveSummary": TO_BE_FILLED,
        "solution": {
            "approach": TO_BE_FILLED,
            "architecture": TO_BE_FILLED,
            "implementationPlan": TO_BE_FILLED,
        },
        "team": [
            { "name": TO_BE_FILLED, "role": TO_BE_FILLED, "experience": TO_BE_FILLED }
        ],
        "budget": {
            "items": [ { "description": TO_BE_FILLED, "cost": TO_BE_FILLED } ],
            "total": TO_BE_FILLED,
        },
        "risks": [ { "risk": TO_BE_FILLED, "mitigation": TO_BE_FILLED } ],
        "differentiators": differentiators,
        "responses": Value::Object(responses),
    }))
}
