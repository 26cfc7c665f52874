//! Agentic loop with tool-calling support.
//!
//! The model is called repeatedly; every tool call it issues is executed
//! and fed back until it answers without tool calls or the iteration cap
//! is reached.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::client::LlmClient;
use super::messages::{ContentPart, ConversationTurn, ToolCall};
use super::models::TokenTally;
use super::tools::{ToolHandler, ToolOutput};
use crate::agents::AgentKind;
use crate::error::AgentError;
use crate::progress::ProgressSink;

pub const NUDGE_INSTRUCTION: &str = "Continue your analysis using the available tools. When you have completed all required steps, respond with your final JSON output.";

/// Vertical offset between consecutive screenshot tiles.
pub const TILE_HEIGHT_PX: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_iterations: usize,
    /// How many prose replies are sent back with a "keep going" turn
    pub max_nudges: usize,
    /// Images from a single tool result actually shown to the model
    pub max_images_per_result: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_nudges: 2,
            max_images_per_result: 2,
        }
    }
}

/// One agent invocation.
pub struct AgentRequest<'a> {
    pub agent: AgentKind,
    pub system: &'a str,
    pub user: &'a str,
    pub tools: Option<&'a dyn ToolHandler>,
    /// Only used when no tools are offered
    pub json_mode: bool,
    pub progress: &'a dyn ProgressSink,
}

impl AgentRequest<'_> {
    pub fn initial_turns(&self) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::system(self.system),
            ConversationTurn::user(self.user),
        ]
    }
}

/// Drive the conversation until the model produces a final text.
///
/// Usage from every call is added to `tally`.
pub async fn run_agent_loop(
    client: &LlmClient,
    request: &AgentRequest<'_>,
    limits: &LoopLimits,
    tally: &mut TokenTally,
) -> Result<String, AgentError> {
    let agent = request.agent.label();
    let specs = request.tools.map(|h| h.specs()).unwrap_or_default();
    let mut messages = request.initial_turns();
    let mut nudges_left = limits.max_nudges;

    for iteration in 1..=limits.max_iterations {
        debug!(agent, iteration, turns = messages.len(), "Agent iteration");
        let reply = client
            .complete(request.agent, &messages, &specs, request.json_mode)
            .await?;
        tally.add(reply.usage.as_ref());

        let handler = match request.tools {
            Some(handler) if !reply.tool_calls.is_empty() => handler,
            _ => {
                let content = reply.content.unwrap_or_default();
                let looks_final = content.trim_start().starts_with('{');
                if request.tools.is_some()
                    && !content.is_empty()
                    && !looks_final
                    && nudges_left > 0
                {
                    nudges_left -= 1;
                    info!(agent, nudges_left, "Model replied with prose, nudging");
                    messages.push(ConversationTurn::assistant(content));
                    messages.push(ConversationTurn::user(NUDGE_INSTRUCTION));
                    continue;
                }
                return Ok(content);
            }
        };

        let calls: Vec<ToolCall> = reply.tool_calls.iter().map(ToolCall::from).collect();
        messages.push(ConversationTurn::assistant_tool_calls(
            reply.content,
            reply.tool_calls,
        ));

        let outputs = join_all(
            calls
                .iter()
                .map(|call| execute_call(handler, call, request.progress, agent)),
        )
        .await;

        // Image turns go after every tool result of this step
        let mut image_turns = Vec::new();
        for (call, output) in calls.iter().zip(outputs) {
            match output {
                ToolOutput::Text(text) => {
                    messages.push(ConversationTurn::tool_result(&call.id, text));
                }
                ToolOutput::Images(tiles) => {
                    let (ack, turn) = relay_images(call, &tiles, limits.max_images_per_result);
                    messages.push(ConversationTurn::tool_result(&call.id, ack));
                    image_turns.extend(turn);
                }
            }
        }
        messages.extend(image_turns);
    }

    warn!(agent, max = limits.max_iterations, "Iteration limit reached");
    Err(AgentError::IterationLimit {
        agent: agent.to_string(),
        max: limits.max_iterations,
    })
}

async fn execute_call(
    handler: &dyn ToolHandler,
    call: &ToolCall,
    progress: &dyn ProgressSink,
    agent: &str,
) -> ToolOutput {
    debug!(agent, tool = %call.name, args = %call.arguments, "Executing tool");
    progress.log_event(agent, &format!("tool: {}", call.name));
    match handler.call(&call.name, &call.arguments).await {
        Ok(output) => output,
        Err(e) => {
            warn!(agent, tool = %call.name, "Tool failed: {}", e);
            ToolOutput::Text(format!("Error: {}", e))
        }
    }
}

/// Build the tool-result acknowledgement and the follow-up user turn
/// carrying the first `max_images` tiles.
fn relay_images(
    call: &ToolCall,
    tiles: &[String],
    max_images: usize,
) -> (String, Option<ConversationTurn>) {
    let url = call
        .arguments
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or("the page");
    let total = tiles.len();
    let shown = total.min(max_images);

    if shown == 0 {
        return (format!("Screenshot of {} produced no image sections.", url), None);
    }

    let ack = format!(
        "Full-page screenshot of {} captured ({} viewport-height sections, showing top {} to model). All {} sections saved for the report dashboard.",
        url, total, shown, total
    );

    let mut parts = vec![ContentPart::text(format!(
        "Screenshot of {} (top {} of {} sections):",
        url, shown, total
    ))];
    for (i, tile) in tiles.iter().take(shown).enumerate() {
        parts.push(ContentPart::text(format!(
            "[Section {}/{}, y={}px]",
            i + 1,
            total,
            i * TILE_HEIGHT_PX
        )));
        parts.push(ContentPart::jpeg_base64(tile));
    }

    (ack, Some(ConversationTurn::user_parts(parts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::llm::messages::{AssistantMessage, Role, ToolCallMessage};
    use crate::llm::models::Usage;
    use crate::llm::scripted::ScriptedBackend;
    use crate::llm::tools::{empty_schema, ToolSpec};
    use crate::progress::ConsoleProgress;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct DemoTools;

    impl ToolHandler for DemoTools {
        fn specs(&self) -> Vec<ToolSpec> {
            vec![ToolSpec {
                name: "slow",
                description: "demo",
                input_schema: empty_schema(),
            }]
        }

        fn call<'a>(
            &'a self,
            name: &'a str,
            args: &'a Value,
        ) -> BoxFuture<'a, Result<ToolOutput, ToolError>> {
            Box::pin(async move {
                match name {
                    "slow" => {
                        let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        Ok(ToolOutput::Text(format!("slept {}", ms)))
                    }
                    "shot" => Ok(ToolOutput::Images(vec![
                        "AAA".to_string(),
                        "BBB".to_string(),
                        "CCC".to_string(),
                    ])),
                    other => Err(ToolError::UnknownTool(other.to_string())),
                }
            })
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCallMessage {
        ToolCallMessage::new(id, name, args)
    }

    fn request<'a>(tools: Option<&'a dyn ToolHandler>, progress: &'a ConsoleProgress) -> AgentRequest<'a> {
        AgentRequest {
            agent: AgentKind::CodeAnalysis,
            system: "sys",
            user: "go",
            tools,
            json_mode: false,
            progress,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_results_keep_call_order() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            AgentKind::CodeAnalysis,
            AssistantMessage::with_tool_calls(vec![
                call("a", "slow", json!({"ms": 300})),
                call("b", "slow", json!({"ms": 10})),
                call("c", "nope", json!({})),
            ]),
        );
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text("{\"ok\": true}"));
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();

        let text = run_agent_loop(
            &client,
            &request(Some(&DemoTools), &progress),
            &LoopLimits::default(),
            &mut tally,
        )
        .await
        .unwrap();
        assert_eq!(text, "{\"ok\": true}");

        let second = &backend.requests()[1].messages;
        let tool_turns: Vec<_> = second.iter().filter(|t| t.role == Role::Tool).collect();
        assert_eq!(tool_turns.len(), 3);
        assert_eq!(tool_turns[0].tool_call_id.as_deref(), Some("a"));
        assert_eq!(tool_turns[0].text(), Some("slept 300"));
        assert_eq!(tool_turns[1].tool_call_id.as_deref(), Some("b"));
        assert_eq!(tool_turns[2].text(), Some("Error: Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_image_results_are_relayed_after_tool_results() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            AgentKind::CodeAnalysis,
            AssistantMessage::with_tool_calls(vec![
                call("s", "shot", json!({"url": "https://example.com"})),
                call("t", "slow", json!({})),
            ]),
        );
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text("{}"));
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();

        run_agent_loop(
            &client,
            &request(Some(&DemoTools), &progress),
            &LoopLimits::default(),
            &mut tally,
        )
        .await
        .unwrap();

        let turns = &backend.requests()[1].messages;
        // system, user, assistant(calls), tool(s), tool(t), user(images)
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[3].role, Role::Tool);
        assert!(turns[3]
            .text()
            .unwrap()
            .contains("(3 viewport-height sections, showing top 2 to model)"));
        assert_eq!(turns[4].role, Role::Tool);
        assert_eq!(turns[5].role, Role::User);
        assert!(turns[5].has_images());
        let images = match &turns[5].content {
            Some(crate::llm::messages::TurnContent::Parts(parts)) => {
                parts.iter().filter(|p| p.is_image()).count()
            }
            _ => 0,
        };
        assert_eq!(images, 2);
    }

    #[tokio::test]
    async fn test_prose_is_nudged_then_accepted() {
        let backend = Arc::new(ScriptedBackend::new());
        for _ in 0..3 {
            backend.push(AgentKind::CodeAnalysis, AssistantMessage::text("Let me think..."));
        }
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();

        let text = run_agent_loop(
            &client,
            &request(Some(&DemoTools), &progress),
            &LoopLimits::default(),
            &mut tally,
        )
        .await
        .unwrap();

        assert_eq!(text, "Let me think...");
        assert_eq!(backend.call_count(), 3);
        let last = backend.requests().last().cloned().unwrap();
        assert_eq!(last.messages.last().unwrap().text(), Some(NUDGE_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_empty_reply_is_not_nudged() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text(""));
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();

        let text = run_agent_loop(
            &client,
            &request(Some(&DemoTools), &progress),
            &LoopLimits::default(),
            &mut tally,
        )
        .await
        .unwrap();

        assert_eq!(text, "");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prose_without_tools_is_final() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(AgentKind::Synthesis, AssistantMessage::text("# Summary"));
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();
        let mut req = request(None, &progress);
        req.agent = AgentKind::Synthesis;

        let text = run_agent_loop(&client, &req, &LoopLimits::default(), &mut tally)
            .await
            .unwrap();
        assert_eq!(text, "# Summary");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_iteration_cap_is_fatal() {
        let backend = Arc::new(ScriptedBackend::new());
        for i in 0..5 {
            backend.push(
                AgentKind::CodeAnalysis,
                AssistantMessage::with_tool_calls(vec![call(&format!("c{}", i), "slow", json!({}))])
                    .with_usage(Usage::new(10, 1)),
            );
        }
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();
        let limits = LoopLimits {
            max_iterations: 4,
            ..LoopLimits::default()
        };

        let err = run_agent_loop(&client, &request(Some(&DemoTools), &progress), &limits, &mut tally)
            .await
            .unwrap_err();
        assert!(err.is_iteration_limit());
        assert!(!err.is_parse());
        assert_eq!(backend.call_count(), 4);
        assert_eq!(tally.input(), 40);
    }
}
