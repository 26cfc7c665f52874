//! Completion client: the single point of contact with the upstream
//! chat-completions endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::backoff::{parse_retry_after_headers, parse_retry_after_text, retry_with_backoff, RetryPolicy};
use super::messages::{AssistantMessage, ConversationTurn, ToolCallMessage};
use super::models::Usage;
use super::tools::{to_provider_tools, ToolDefinition, ToolSpec};
use crate::agents::AgentKind;
use crate::config::LlmSettings;
use crate::error::LlmError;
use crate::util::truncate_str;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum length for error content in error messages
const MAX_ERROR_CONTENT_LEN: usize = 300;

/// One request to the completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Which agent is asking. Backends that do not care ignore it.
    pub agent: AgentKind,
    pub messages: Vec<ConversationTurn>,
    pub tools: Vec<ToolDefinition>,
    /// Ask for guaranteed-parseable JSON. Only honored when `tools` is empty.
    pub json_mode: bool,
}

/// Something that can answer a completion request.
pub trait CompletionBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<AssistantMessage, LlmError>>;
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALL SHAPES
// ═══════════════════════════════════════════════════════════════════════════

/// Cheap-to-clone handle shared by every agent in a run.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn CompletionBackend>,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Issue one request. With tools, the reply may carry tool calls instead
    /// of text; without tools, `json_mode` may be requested.
    pub async fn complete(
        &self,
        agent: AgentKind,
        messages: &[ConversationTurn],
        tools: &[ToolSpec],
        json_mode: bool,
    ) -> Result<AssistantMessage, LlmError> {
        let request = CompletionRequest {
            agent,
            messages: messages.to_vec(),
            tools: to_provider_tools(tools),
            json_mode: json_mode && tools.is_empty(),
        };
        self.backend.complete(&request).await
    }

    /// Single-shot request whose messages may carry image blocks. Never
    /// combined with tool definitions.
    pub async fn complete_multimodal(
        &self,
        agent: AgentKind,
        messages: &[ConversationTurn],
    ) -> Result<AssistantMessage, LlmError> {
        let request = CompletionRequest {
            agent,
            messages: messages.to_vec(),
            tools: Vec::new(),
            json_mode: true,
        };
        self.backend.complete(&request).await
    }

    /// Plain system + user single-shot. Returns the text and reported usage.
    pub async fn simple_completion(
        &self,
        agent: AgentKind,
        system: &str,
        user: &str,
        json_mode: bool,
    ) -> Result<(String, Option<Usage>), LlmError> {
        let messages = [ConversationTurn::system(system), ConversationTurn::user(user)];
        let reply = self.complete(agent, &messages, &[], json_mode).await?;
        Ok((reply.content.unwrap_or_default(), reply.usage))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HTTP BACKEND
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "<[ToolDefinition]>::is_empty")]
    tools: &'a [ToolDefinition],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// OpenAI-compatible chat-completions backend with retry and backoff.
pub struct OpenAiBackend {
    http: reqwest::Client,
    settings: LlmSettings,
    policy: RetryPolicy,
}

impl OpenAiBackend {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        Self::with_policy(settings, RetryPolicy::default())
    }

    pub fn with_policy(settings: LlmSettings, policy: RetryPolicy) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            settings,
            policy,
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<AssistantMessage, LlmError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: &request.messages,
            max_tokens: self.settings.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
            tools: &request.tools,
        };

        let response = self
            .http
            .post(self.settings.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let hint = parse_retry_after_headers(response.headers());
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &text, hint));
        }

        parse_chat_response(&text)
    }
}

impl CompletionBackend for OpenAiBackend {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<AssistantMessage, LlmError>> {
        Box::pin(async move {
            let label = request.agent.label();
            debug!(
                agent = label,
                turns = request.messages.len(),
                tools = request.tools.len(),
                json_mode = request.json_mode,
                "Sending completion request"
            );
            let result = retry_with_backoff(&self.policy, label, || self.send_once(request)).await;
            if let Err(LlmError::PayloadTooLarge(msg)) = &result {
                error!(agent = label, "Request exceeds token limit (not retryable): {}", msg);
            }
            result
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        LlmError::Network(err.to_string())
    } else if err.is_decode() {
        LlmError::MalformedResponse(err.to_string())
    } else {
        LlmError::Network(err.to_string())
    }
}

fn is_payload_too_large(message: &str, code: Option<&str>) -> bool {
    let lower = message.to_lowercase();
    lower.contains("request too large")
        || lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
        || code == Some("context_length_exceeded")
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) fn classify_http_error(status: u16, body: &str, hint: Option<Duration>) -> LlmError {
    let (message, code) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .code
                .as_ref()
                .and_then(|c| c.as_str().map(str::to_string));
            (parsed.error.message, code)
        }
        Err(_) => (truncate_str(body, MAX_ERROR_CONTENT_LEN).to_string(), None),
    };

    if status == 413 || is_payload_too_large(&message, code.as_deref()) {
        return LlmError::PayloadTooLarge(message);
    }

    match status {
        429 => {
            let retry_after = hint.or_else(|| parse_retry_after_text(&message));
            LlmError::RateLimited {
                message,
                retry_after,
            }
        }
        500..=599 => LlmError::Network(format!("server error {}: {}", status, message)),
        _ => LlmError::Api { status, message },
    }
}

pub(crate) fn parse_chat_response(text: &str) -> Result<AssistantMessage, LlmError> {
    // Some gateways return an error object with a 200 status
    if serde_json::from_str::<ErrorResponse>(text).is_ok() {
        return Err(classify_http_error(200, text, None));
    }

    let parsed: ChatResponse = serde_json::from_str(text).map_err(|e| {
        LlmError::MalformedResponse(format!(
            "{}: {}",
            e,
            truncate_str(text, MAX_ERROR_CONTENT_LEN)
        ))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("No choices in response".to_string()))?;

    Ok(AssistantMessage {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        usage: parsed.usage,
    })
}
