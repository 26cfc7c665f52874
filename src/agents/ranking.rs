//! Two-pass feature ranking.
//!
//! Neither pass uses tools. Inputs are slimmed before sending: upstream
//! outputs carry fields the ranking never looks at.

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::prompts::{RANKING_PASS1_SYSTEM, RANKING_PASS2_SYSTEM};
use super::{run_tool_agent, AgentContext, AgentKind};
use crate::error::AgentError;
use crate::schemas::code_analysis::CodeAnalysisOutput;
use crate::schemas::feasibility::FeasibilityOutput;
use crate::schemas::quality::QualityAuditOutput;
use crate::schemas::recommendations::{Pass1Output, Pass2Output, RankedOutput};
use crate::schemas::research::ComparativeResearchOutput;

/// Research without design systems, code analysis without the diagram and
/// with components reduced to name and path.
pub fn pass1_payload(
    research: &ComparativeResearchOutput,
    code_analysis: &CodeAnalysisOutput,
    priorities: &[String],
) -> Value {
    let mut research = serde_json::to_value(research).unwrap_or_default();
    if let Some(obj) = research.as_object_mut() {
        obj.remove("design_systems");
    }

    let mut code = serde_json::to_value(code_analysis).unwrap_or_default();
    if let Some(obj) = code.as_object_mut() {
        if let Some(arch) = obj.get_mut("architecture").and_then(Value::as_object_mut) {
            arch.remove("mermaid_diagram");
        }
        let components: Vec<Value> = code_analysis
            .components
            .iter()
            .map(|c| json!({"name": c.name, "file_path": c.file_path}))
            .collect();
        obj.insert("components".to_string(), Value::Array(components));
    }

    json!({
        "research": research,
        "code_analysis": code,
        "user_priorities": priorities,
    })
}

/// Pass 1 reduced to id, title, category, rank and scores, plus the
/// feasibility output and the quality audit's priority issues and summary.
pub fn pass2_payload(
    pass1: &Pass1Output,
    feasibility: &FeasibilityOutput,
    quality: &QualityAuditOutput,
) -> Value {
    let recommendations: Vec<Value> = pass1
        .recommendations
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "title": r.title,
                "category": r.category,
                "rank": r.rank,
                "scores": r.scores,
            })
        })
        .collect();

    json!({
        "pass1_recommendations": {
            "recommendations": recommendations,
            "quick_wins": pass1.quick_wins,
            "summary": pass1.summary,
        },
        "feasibility": feasibility,
        "quality_audit": {
            "priority_issues": quality.priority_issues,
            "summary": quality.summary,
        },
    })
}

fn normalized<T: RankedOutput>(mut output: T, pass: &str) -> T {
    if !output.is_consistent() {
        warn!(pass, "Ranking ids did not match ranks, renumbering");
    }
    output.normalize();
    debug!(pass, count = output.recommendations().len(), "Ranking normalized");
    output
}

pub async fn run_pass1(
    ctx: &AgentContext<'_>,
    research: &ComparativeResearchOutput,
    code_analysis: &CodeAnalysisOutput,
    priorities: &[String],
) -> Result<Pass1Output, AgentError> {
    let payload = pass1_payload(research, code_analysis, priorities);
    let output: Pass1Output = run_tool_agent(
        ctx,
        AgentKind::RankingPass1,
        RANKING_PASS1_SYSTEM,
        &payload.to_string(),
        None,
    )
    .await?;
    Ok(normalized(output, "pass 1"))
}

pub async fn run_pass2(
    ctx: &AgentContext<'_>,
    pass1: &Pass1Output,
    feasibility: &FeasibilityOutput,
    quality: &QualityAuditOutput,
) -> Result<Pass2Output, AgentError> {
    let payload = pass2_payload(pass1, feasibility, quality);
    let output: Pass2Output = run_tool_agent(
        ctx,
        AgentKind::RankingPass2,
        RANKING_PASS2_SYSTEM,
        &payload.to_string(),
        None,
    )
    .await?;
    Ok(normalized(output, "pass 2"))
}
