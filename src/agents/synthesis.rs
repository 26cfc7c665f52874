//! Executive summary over condensed pipeline results.

use serde_json::{json, Map, Value};
use tracing::warn;

use super::prompts::SYNTHESIS_SYSTEM;
use super::{run_text_agent, AgentContext, AgentKind};
use crate::schemas::pipeline::PipelineState;

pub const SYNTHESIS_FALLBACK: &str =
    "Executive summary generation failed. See individual sections below.";

/// Final ranking reduced to headline fields, plus one summary line per
/// other analysis that ran.
pub fn synthesis_payload(state: &PipelineState) -> Value {
    let mut payload = Map::new();

    if let Some(ranking) = state.final_recommendations() {
        let recs: Vec<Value> = ranking
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
        payload.insert("recommendations".into(), Value::Array(recs));
        payload.insert("quick_wins".into(), json!(ranking.quick_wins));
        payload.insert("summary".into(), json!(ranking.summary));
    }

    let summaries = [
        ("feasibility_summary", state.feasibility.as_ref().map(|f| &f.summary)),
        ("quality_summary", state.quality_audit.as_ref().map(|q| &q.summary)),
        ("research_summary", state.research.as_ref().map(|r| &r.summary)),
        ("code_summary", state.code_analysis.as_ref().map(|c| &c.summary)),
        ("ux_design_summary", state.ux_design.as_ref().map(|u| &u.summary)),
    ];
    for (key, summary) in summaries {
        if let Some(summary) = summary {
            payload.insert(key.into(), json!(summary));
        }
    }

    Value::Object(payload)
}

/// Never fails: any error yields the fixed fallback text.
pub async fn run_synthesis(ctx: &AgentContext<'_>, state: &PipelineState) -> String {
    let payload = synthesis_payload(state);
    match run_text_agent(ctx, AgentKind::Synthesis, SYNTHESIS_SYSTEM, &payload.to_string()).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Synthesis returned an empty summary");
            SYNTHESIS_FALLBACK.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Synthesis failed, using fallback summary");
            ctx.progress.fail_agent(AgentKind::Synthesis.label(), &e.to_string());
            SYNTHESIS_FALLBACK.to_string()
        }
    }
}
