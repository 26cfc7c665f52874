//! Offline backend for `--dry-run`.
//!
//! Replies are chosen by the agent kind on the request, never by prompt
//! text. Tool-capable agents first replay a short tool script so the loop,
//! the tool handlers and progress reporting all run.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use super::client::{CompletionBackend, CompletionRequest};
use super::messages::{AssistantMessage, Role, ToolCallMessage};
use super::models::Usage;
use crate::agents::AgentKind;
use crate::error::LlmError;

const DRY_RUN_USAGE: Usage = Usage {
    prompt_tokens: 1200,
    completion_tokens: 300,
};

const SYNTHESIS_TEXT: &str = "# Executive Summary\n\nThe site is a modern Next.js application. Top recommendation: add dark mode (REC-001).";

#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBackend;

impl DryRunBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Tool calls for `step`, or `None` once the script is done.
fn scripted_calls(agent: AgentKind, step: usize) -> Option<Vec<ToolCallMessage>> {
    let call = |name: &str, args: Value| ToolCallMessage::new(format!("dry_{}", step), name, args);
    match (agent, step) {
        (AgentKind::ComparativeResearch, 0) => Some(vec![call(
            "ask_user",
            json!({"question": "What does the site do, in one sentence?"}),
        )]),
        (AgentKind::ComparativeResearch, 1) => Some(vec![call(
            "ask_user",
            json!({"question": "Do you have competitors in mind?"}),
        )]),
        (AgentKind::ComparativeResearch, 2) => Some(vec![call(
            "ask_user",
            json!({"question": "Should I compare against Acme Docs and Globex Help?"}),
        )]),
        (AgentKind::CodeAnalysis, 0) => Some(vec![call("get_tree", json!({}))]),
        (AgentKind::CodeAnalysis, 1) => Some(vec![call("read_manifest", json!({}))]),
        (AgentKind::TechFeasibility, 0) => {
            Some(vec![call("read_file", json!({"path": "package.json"}))])
        }
        _ => None,
    }
}

/// Feature named in a tech stack request, if the payload carries one.
fn requested_feature(request: &CompletionRequest) -> Option<String> {
    let user = request.messages.iter().find(|m| m.role == Role::User)?;
    let payload: Value = serde_json::from_str(user.text()?).ok()?;
    payload["features_to_evaluate"][0]["feature_name"]
        .as_str()
        .map(str::to_string)
}

fn canned_json(agent: AgentKind, request: &CompletionRequest) -> Value {
    match agent {
        AgentKind::ComparativeResearch => json!({
            "competitors": [
                {"name": "Acme Docs", "url": "https://acme.example", "relevance": "Same audience",
                 "strengths": ["Fast search"], "weaknesses": ["Dense navigation"]},
                {"name": "Globex Help", "url": "https://globex.example", "relevance": "Similar product",
                 "strengths": ["Dark mode"], "weaknesses": ["Slow pages"]}
            ],
            "feature_matrix": [
                {"feature": "Dark mode", "current_site": "no",
                 "competitors": {"Acme Docs": "yes", "Globex Help": "yes"}}
            ],
            "ux_patterns": [
                {"name": "Command palette", "description": "Keyboard-driven search",
                 "seen_in": ["Acme Docs"], "relevance": "high"}
            ],
            "gaps": [
                {"description": "No dark mode", "severity": "medium", "user_value": "high",
                 "competitor_prevalence": 2, "competitors_with_feature": ["Acme Docs", "Globex Help"]}
            ],
            "trends": ["Theme switching"],
            "design_systems": [],
            "summary": "Competitors offer dark mode and faster search."
        }),
        AgentKind::CodeAnalysis => json!({
            "tech_stack": [
                {"name": "Next.js", "category": "framework", "version": "14",
                 "ux_pros": ["Server rendering"], "ux_cons": []},
                {"name": "Tailwind CSS", "category": "styling", "version": "3",
                 "ux_pros": ["Consistent spacing"], "ux_cons": ["No theme tokens"]}
            ],
            "architecture": {
                "routing_pattern": "app router",
                "data_flow": "server components with client islands",
                "component_tree_summary": "Layout, Nav, Page, Footer",
                "mermaid_diagram": "flowchart TD\n    Layout --> Nav\n    Layout --> Page"
            },
            "components": [{"name": "Nav", "file_path": "src/components/Nav.tsx",
                            "description": "Top navigation", "has_tests": false}],
            "tech_debt": [],
            "design_system": {"has_design_system": false, "theming_support": "none",
                              "component_library": "none"},
            "bundle_notes": "",
            "summary": "A modern Next.js application styled with Tailwind."
        }),
        AgentKind::RankingPass1 => json!({
            "recommendations": [
                {"id": "REC-001", "title": "Add dark mode", "description": "Theme toggle with persisted preference",
                 "rationale": "Both competitors ship it", "category": "quick-win",
                 "estimated_complexity": "low", "expected_impact": "high",
                 "scores": {"user_value": 8, "novelty": 3, "feasibility": 7, "accessibility_impact": 6},
                 "rank": 1, "parity_gap": true,
                 "competitors_with_feature": ["Acme Docs", "Globex Help"], "user_value_signal": "high"},
                {"id": "REC-002", "title": "Site-wide search", "description": "Search across all pages",
                 "rationale": "Findability", "category": "medium-term",
                 "scores": {"user_value": 8, "novelty": 4, "feasibility": 5, "accessibility_impact": 4},
                 "rank": 2},
                {"id": "REC-003", "title": "Improve focus styles", "description": "Visible focus rings",
                 "rationale": "Keyboard users", "category": "quick-win",
                 "scores": {"user_value": 6, "novelty": 2, "feasibility": 9, "accessibility_impact": 9},
                 "rank": 3}
            ],
            "quick_wins": ["REC-001", "REC-003"],
            "long_term": [],
            "summary": "Dark mode leads on parity; focus styles are a cheap accessibility win."
        }),
        AgentKind::RankingPass2 => json!({
            "recommendations": [
                {"id": "REC-001", "title": "Add dark mode", "description": "Theme toggle with persisted preference",
                 "category": "quick-win",
                 "scores": {"user_value": 8, "novelty": 3, "feasibility": 9, "accessibility_impact": 6},
                 "rank": 1, "parity_gap": true,
                 "competitors_with_feature": ["Acme Docs", "Globex Help"], "user_value_signal": "high"},
                {"id": "REC-002", "title": "Improve focus styles", "description": "Visible focus rings",
                 "category": "quick-win",
                 "scores": {"user_value": 6, "novelty": 2, "feasibility": 9, "accessibility_impact": 9},
                 "rank": 2},
                {"id": "REC-003", "title": "Site-wide search", "description": "Search across all pages",
                 "category": "medium-term",
                 "scores": {"user_value": 8, "novelty": 4, "feasibility": 6, "accessibility_impact": 4},
                 "rank": 3}
            ],
            "promoted": ["REC-002"],
            "demoted": ["REC-003"],
            "quick_wins": ["REC-001", "REC-002"],
            "long_term": [],
            "summary": "Focus styles move up once feasibility is known."
        }),
        AgentKind::TechFeasibility => json!({
            "assessments": [
                {"recommendation_id": "REC-001", "rating": "easy", "cost_estimate": "small",
                 "developer_days": "2", "risk": "low",
                 "pros": [{"point": "Tailwind has a dark variant", "weight": "major"}], "cons": []},
                {"recommendation_id": "REC-002", "rating": "moderate", "cost_estimate": "medium",
                 "developer_days": "8", "new_dependencies": ["flexsearch"], "risk": "medium"},
                {"recommendation_id": "REC-003", "rating": "easy", "cost_estimate": "small",
                 "developer_days": "1", "risk": "low"}
            ],
            "summary": "Everything fits the current stack."
        }),
        AgentKind::TechStackAdvisor => {
            let feature = requested_feature(request).unwrap_or_else(|| "Add dark mode".to_string());
            json!({
                "features": [{
                    "feature_name": feature,
                    "parity_source": [],
                    "current_stack_compatibility": "Good",
                    "simple_approach": {
                        "approach_name": "simple",
                        "description": "Build on the existing stack",
                        "tech_stack": ["Next.js", "Tailwind CSS"],
                        "architecture_fit": "fits_as_is",
                        "effort_estimate": "1-2 days",
                        "pros": ["No new dependencies"], "cons": []
                    },
                    "comprehensive_approach": null,
                    "recommended_approach": "simple",
                    "recommendation_rationale": "The stack already supports it.",
                    "diagrams": [{
                        "title": "Current architecture", "phase": "current",
                        "mermaid": "flowchart TD\n    Layout[Layout]:::keep --> Nav[Nav]:::keep",
                        "summary": "The layout and navigation are healthy."
                    }]
                }],
                "summary": "One feature evaluated."
            })
        }
        AgentKind::UxDesignAudit => json!({
            "layout": {"visual_hierarchy": "Clear", "whitespace_usage": "Generous"},
            "typography": {"readability": "Good"},
            "color": {"palette_coherence": "Consistent", "dark_mode_notes": "No dark theme"},
            "navigation": {"clarity": "Clear"},
            "issues": [{"area": "color", "description": "No dark theme", "severity": "minor",
                        "recommendation": "Add a theme toggle",
                        "competitors_doing_better": ["Globex Help"]}],
            "strengths": ["Clean layout"],
            "overall_impression": "Polished",
            "summary": "A clean design missing a dark theme."
        }),
        AgentKind::Synthesis => Value::String(SYNTHESIS_TEXT.to_string()),
    }
}

impl CompletionBackend for DryRunBackend {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<AssistantMessage, LlmError>> {
        Box::pin(async move {
            let step = request
                .messages
                .iter()
                .filter(|m| m.role == Role::Assistant && m.has_tool_calls())
                .count();
            let agent = request.agent;
            debug!(agent = agent.label(), step, "Dry-run reply");

            let reply = if !request.tools.is_empty() {
                scripted_calls(agent, step).map(AssistantMessage::with_tool_calls)
            } else {
                None
            };
            let reply = reply.unwrap_or_else(|| match canned_json(agent, request) {
                Value::String(text) => AssistantMessage::text(text),
                value => AssistantMessage::text(value.to_string()),
            });
            Ok(reply.with_usage(DRY_RUN_USAGE))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::messages::ConversationTurn;
    use crate::llm::tools::ToolDefinition;
    use crate::schemas::code_analysis::CodeAnalysisOutput;
    use crate::schemas::feasibility::FeasibilityOutput;
    use crate::schemas::recommendations::{Pass1Output, Pass2Output, RankedOutput};
    use crate::schemas::research::ComparativeResearchOutput;
    use crate::schemas::tech_stack::TechStackAdvisorOutput;
    use crate::schemas::ux_design::UxDesignOutput;

    fn request(agent: AgentKind, messages: Vec<ConversationTurn>, tools: Vec<ToolDefinition>) -> CompletionRequest {
        CompletionRequest {
            agent,
            messages,
            tools,
            json_mode: false,
        }
    }

    fn tool_defs() -> Vec<ToolDefinition> {
        use crate::agents::code_analysis::CodeTool;
        use crate::llm::tools::ToolKind;
        CodeTool::ALL.iter().map(|t| ToolDefinition::from(&t.spec())).collect()
    }

    async fn reply(req: &CompletionRequest) -> AssistantMessage {
        DryRunBackend::new().complete(req).await.unwrap()
    }

    #[tokio::test]
    async fn test_code_analysis_script_then_json() {
        let mut messages = vec![ConversationTurn::system("s"), ConversationTurn::user("u")];

        let first = reply(&request(AgentKind::CodeAnalysis, messages.clone(), tool_defs())).await;
        assert_eq!(first.tool_calls[0].function.name, "get_tree");
        messages.push(ConversationTurn::assistant_tool_calls(None, first.tool_calls));

        let second = reply(&request(AgentKind::CodeAnalysis, messages.clone(), tool_defs())).await;
        assert_eq!(second.tool_calls[0].function.name, "read_manifest");
        messages.push(ConversationTurn::assistant_tool_calls(None, second.tool_calls));

        let last = reply(&request(AgentKind::CodeAnalysis, messages, tool_defs())).await;
        assert!(last.tool_calls.is_empty());
        let parsed: CodeAnalysisOutput = serde_json::from_str(&last.content.unwrap()).unwrap();
        assert_eq!(parsed.tech_stack[0].name, "Next.js");
        assert_eq!(last.usage, Some(DRY_RUN_USAGE));
    }

    #[tokio::test]
    async fn test_canned_outputs_match_schemas() {
        let base = vec![ConversationTurn::system("s"), ConversationTurn::user("{}")];
        let text = |agent| {
            let req = request(agent, base.clone(), Vec::new());
            async move { reply(&req).await.content.unwrap() }
        };

        serde_json::from_str::<ComparativeResearchOutput>(&text(AgentKind::ComparativeResearch).await).unwrap();
        let pass1: Pass1Output = serde_json::from_str(&text(AgentKind::RankingPass1).await).unwrap();
        assert!(pass1.is_consistent());
        let pass2: Pass2Output = serde_json::from_str(&text(AgentKind::RankingPass2).await).unwrap();
        assert!(pass2.is_consistent());
        serde_json::from_str::<FeasibilityOutput>(&text(AgentKind::TechFeasibility).await).unwrap();
        serde_json::from_str::<UxDesignOutput>(&text(AgentKind::UxDesignAudit).await).unwrap();
        assert!(text(AgentKind::Synthesis).await.starts_with("# Executive Summary"));
    }

    #[tokio::test]
    async fn test_tech_stack_echoes_requested_feature() {
        let payload = json!({"features_to_evaluate": [{"feature_name": "site search"}], "current_stack": {}});
        let req = request(
            AgentKind::TechStackAdvisor,
            vec![ConversationTurn::system("s"), ConversationTurn::user(payload.to_string())],
            tool_defs(),
        );
        let out = reply(&req).await;
        let parsed: TechStackAdvisorOutput = serde_json::from_str(&out.content.unwrap()).unwrap();
        assert_eq!(parsed.features[0].feature_name, "site search");
    }
}
