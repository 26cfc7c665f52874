//! Per-feature tech stack advice.
//!
//! Each feature gets its own agent run so a long list does not blow the
//! output limit of a single reply.

use serde_json::{json, Value};
use tracing::info;

use super::code_analysis::CodebaseTools;
use super::feasibility::code_context;
use super::prompts::TECH_STACK_SYSTEM;
use super::{run_tool_agent, AgentContext, AgentKind};
use crate::codebase::CodebaseReader;
use crate::error::AgentError;
use crate::schemas::code_analysis::CodeAnalysisOutput;
use crate::schemas::recommendations::Pass1Output;
use crate::schemas::tech_stack::TechStackAdvisorOutput;

/// One feature to evaluate, with the competitors that already ship it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub name: String,
    pub parity_source: Vec<String>,
}

/// Configured features first, then pass-1 titles. Case-insensitive
/// duplicates keep their first spelling.
pub fn features_to_evaluate(configured: &[String], pass1: Option<&Pass1Output>) -> Vec<String> {
    let titles = pass1
        .into_iter()
        .flat_map(|p| p.recommendations.iter().map(|r| r.title.clone()));

    let mut seen = std::collections::HashSet::new();
    configured
        .iter()
        .cloned()
        .chain(titles)
        .filter(|f| !f.trim().is_empty())
        .filter(|f| seen.insert(f.to_lowercase()))
        .collect()
}

/// Competitors for the first parity-gap recommendation whose title
/// contains the feature, or is contained by it.
pub fn parity_for(feature: &str, pass1: Option<&Pass1Output>) -> Vec<String> {
    let Some(pass1) = pass1 else {
        return Vec::new();
    };
    let needle = feature.to_lowercase();
    pass1
        .recommendations
        .iter()
        .filter(|r| r.parity_gap && !r.competitors_with_feature.is_empty())
        .find(|r| {
            let title = r.title.to_lowercase();
            title.contains(&needle) || needle.contains(&title)
        })
        .map(|r| r.competitors_with_feature.clone())
        .unwrap_or_default()
}

pub fn feature_requests(features: &[String], pass1: Option<&Pass1Output>) -> Vec<FeatureRequest> {
    features
        .iter()
        .map(|name| FeatureRequest {
            name: name.clone(),
            parity_source: parity_for(name, pass1),
        })
        .collect()
}

pub fn feature_payload(feature: &FeatureRequest, code_analysis: Option<&CodeAnalysisOutput>) -> Value {
    let mut entry = json!({"feature_name": feature.name});
    if !feature.parity_source.is_empty() {
        entry["parity_source"] = json!(feature.parity_source);
    }
    json!({
        "features_to_evaluate": [entry],
        "current_stack": code_context(code_analysis),
    })
}

/// Run the advisor once per feature and merge the results.
///
/// A failed feature fails the whole evaluation.
pub async fn run_tech_stack(
    ctx: &AgentContext<'_>,
    reader: &CodebaseReader,
    features: &[FeatureRequest],
    code_analysis: Option<&CodeAnalysisOutput>,
) -> Result<TechStackAdvisorOutput, AgentError> {
    let agent = AgentKind::TechStackAdvisor.label();
    let tools = CodebaseTools::read_and_search(reader);
    let mut merged = TechStackAdvisorOutput::default();

    for (i, feature) in features.iter().enumerate() {
        ctx.progress.update_agent(
            agent,
            &format!("[{}/{}] {}", i + 1, features.len(), feature.name),
        );
        let payload = feature_payload(feature, code_analysis);
        let out: TechStackAdvisorOutput = run_tool_agent(
            ctx,
            AgentKind::TechStackAdvisor,
            TECH_STACK_SYSTEM,
            &payload.to_string(),
            Some(&tools),
        )
        .await?;
        info!(feature = %feature.name, approaches = out.features.len(), "Feature evaluated");
        merged.features.extend(out.features);
    }

    merged.summary = format!("Evaluated {} feature(s).", merged.features.len());
    Ok(merged)
}
