//! The fixed set of pipeline agents.
//!
//! Each agent is a system prompt, an optional closed tool set and a typed
//! output. The helpers here run one invocation end to end: the agent loop,
//! the reformat retry and a single token report.

pub mod code_analysis;
pub mod feasibility;
pub mod prompts;
pub mod ranking;
pub mod research;
pub mod synthesis;
pub mod tech_stack;
pub mod ux_design;

use serde::de::DeserializeOwned;

use crate::error::AgentError;
use crate::llm::agentic::{run_agent_loop, AgentRequest, LoopLimits};
use crate::llm::client::LlmClient;
use crate::llm::messages::{ContentPart, ConversationTurn};
use crate::llm::models::TokenTally;
use crate::llm::parse::parse_with_retry;
use crate::llm::tools::ToolHandler;
use crate::progress::ProgressSink;

/// Which agent a completion request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    ComparativeResearch,
    CodeAnalysis,
    RankingPass1,
    RankingPass2,
    TechFeasibility,
    TechStackAdvisor,
    UxDesignAudit,
    Synthesis,
}

impl AgentKind {
    pub const ALL: [AgentKind; 8] = [
        AgentKind::ComparativeResearch,
        AgentKind::CodeAnalysis,
        AgentKind::RankingPass1,
        AgentKind::RankingPass2,
        AgentKind::TechFeasibility,
        AgentKind::TechStackAdvisor,
        AgentKind::UxDesignAudit,
        AgentKind::Synthesis,
    ];

    /// Display name, also the key for token usage in the report.
    pub fn label(self) -> &'static str {
        match self {
            AgentKind::ComparativeResearch => "Comparative Research",
            AgentKind::CodeAnalysis => "Code Analysis",
            AgentKind::RankingPass1 => "Feature Ranking (Pass 1)",
            AgentKind::RankingPass2 => "Feature Ranking (Pass 2)",
            AgentKind::TechFeasibility => "Tech Feasibility",
            AgentKind::TechStackAdvisor => "Tech Stack Advisor",
            AgentKind::UxDesignAudit => "UX Design Audit",
            AgentKind::Synthesis => "Synthesis",
        }
    }
}

/// Shared handles for running agents.
#[derive(Clone, Copy)]
pub struct AgentContext<'a> {
    pub client: &'a LlmClient,
    pub progress: &'a dyn ProgressSink,
    pub limits: LoopLimits,
}

impl<'a> AgentContext<'a> {
    pub fn new(client: &'a LlmClient, progress: &'a dyn ProgressSink) -> Self {
        Self {
            client,
            progress,
            limits: LoopLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Run the agent loop and parse the final text into `T`.
///
/// Without tools the single call asks for JSON mode. Usage is reported once
/// after the invocation, whether it succeeded or not.
pub async fn run_tool_agent<T: DeserializeOwned>(
    ctx: &AgentContext<'_>,
    kind: AgentKind,
    system: &str,
    user: &str,
    tools: Option<&dyn ToolHandler>,
) -> Result<T, AgentError> {
    let request = AgentRequest {
        agent: kind,
        system,
        user,
        tools,
        json_mode: tools.is_none(),
        progress: ctx.progress,
    };
    let mut tally = TokenTally::default();
    let result = loop_and_parse(ctx, &request, &mut tally).await;
    ctx.progress.record_tokens(kind.label(), &tally);
    result
}

async fn loop_and_parse<T: DeserializeOwned>(
    ctx: &AgentContext<'_>,
    request: &AgentRequest<'_>,
    tally: &mut TokenTally,
) -> Result<T, AgentError> {
    let raw = run_agent_loop(ctx.client, request, &ctx.limits, tally).await?;
    parse_with_retry(ctx.client, request.agent, &request.initial_turns(), raw, tally).await
}

/// Single multimodal call parsed into `T`.
///
/// The reformat retry resends only the system prompt and the first answer,
/// not the images.
pub async fn run_vision_agent<T: DeserializeOwned>(
    ctx: &AgentContext<'_>,
    kind: AgentKind,
    system: &str,
    parts: Vec<ContentPart>,
) -> Result<T, AgentError> {
    let mut tally = TokenTally::default();
    let result = vision_and_parse(ctx, kind, system, parts, &mut tally).await;
    ctx.progress.record_tokens(kind.label(), &tally);
    result
}

async fn vision_and_parse<T: DeserializeOwned>(
    ctx: &AgentContext<'_>,
    kind: AgentKind,
    system: &str,
    parts: Vec<ContentPart>,
    tally: &mut TokenTally,
) -> Result<T, AgentError> {
    let turns = [
        ConversationTurn::system(system),
        ConversationTurn::user_parts(parts),
    ];
    let reply = ctx.client.complete_multimodal(kind, &turns).await?;
    tally.add(reply.usage.as_ref());
    let raw = reply.content.unwrap_or_default();
    parse_with_retry(ctx.client, kind, &turns[..1], raw, tally).await
}

/// Plain-text single shot with JSON mode off.
pub async fn run_text_agent(
    ctx: &AgentContext<'_>,
    kind: AgentKind,
    system: &str,
    user: &str,
) -> Result<String, AgentError> {
    let mut tally = TokenTally::default();
    let result = ctx.client.simple_completion(kind, system, user, false).await;
    if let Ok((_, usage)) = &result {
        tally.add(usage.as_ref());
    }
    ctx.progress.record_tokens(kind.label(), &tally);
    Ok(result?.0)
}
