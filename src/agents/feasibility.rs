//! Technical feasibility of pass-1 recommendations against the real codebase.

use serde_json::{json, Value};

use super::code_analysis::CodebaseTools;
use super::prompts::FEASIBILITY_SYSTEM;
use super::{run_tool_agent, AgentContext, AgentKind};
use crate::codebase::CodebaseReader;
use crate::config::Constraints;
use crate::error::AgentError;
use crate::schemas::code_analysis::CodeAnalysisOutput;
use crate::schemas::feasibility::FeasibilityOutput;
use crate::schemas::recommendations::Pass1Output;

/// Tech stack, architecture and summary. Missing analysis gives an empty
/// context rather than none.
pub fn code_context(code_analysis: Option<&CodeAnalysisOutput>) -> Value {
    match code_analysis {
        Some(code) => json!({
            "tech_stack": code.tech_stack,
            "architecture": code.architecture,
            "summary": code.summary,
        }),
        None => json!({}),
    }
}

pub fn feasibility_payload(
    pass1: Option<&Pass1Output>,
    code_analysis: Option<&CodeAnalysisOutput>,
    constraints: &Constraints,
) -> Value {
    let recommendations = pass1
        .map(|p| serde_json::to_value(&p.recommendations).unwrap_or_default())
        .unwrap_or_else(|| json!([]));
    json!({
        "recommendations": recommendations,
        "code_context": code_context(code_analysis),
        "constraints": constraints,
    })
}

pub async fn run_feasibility(
    ctx: &AgentContext<'_>,
    reader: &CodebaseReader,
    pass1: Option<&Pass1Output>,
    code_analysis: Option<&CodeAnalysisOutput>,
    constraints: &Constraints,
) -> Result<FeasibilityOutput, AgentError> {
    let tools = CodebaseTools::read_and_search(reader);
    let payload = feasibility_payload(pass1, code_analysis, constraints);
    run_tool_agent(
        ctx,
        AgentKind::TechFeasibility,
        FEASIBILITY_SYSTEM,
        &payload.to_string(),
        Some(&tools),
    )
    .await
}
