//! Conversation turns in the chat-completions wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::models::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Tool result, correlated to its call through `tool_call_id`
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One block of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// A base64 JPEG tile sent at low detail.
    pub fn jpeg_base64(tile: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/jpeg;base64,{}", tile),
                detail: Some("low".to_string()),
            },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCallMessage,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallMessage {
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

/// A message in the conversation. Ordering is significant and append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<TurnContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(TurnContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: Some(TurnContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallMessage>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.filter(|c| !c.is_empty()).map(TurnContent::Text),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(TurnContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Plain-text content, if this turn carries any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(TurnContent::Text(text)) => Some(text),
            Some(TurnContent::Parts(parts)) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            }),
            None => None,
        }
    }

    pub fn has_images(&self) -> bool {
        match &self.content {
            Some(TurnContent::Parts(parts)) => parts.iter().any(ContentPart::is_image),
            _ => false,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// A tool call as seen by a tool handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Untyped argument object; malformed arguments become `{}`.
    pub arguments: Value,
}

impl From<&ToolCallMessage> for ToolCall {
    fn from(msg: &ToolCallMessage) -> Self {
        let arguments = serde_json::from_str::<Value>(&msg.function.arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Default::default()));
        Self {
            id: msg.id.clone(),
            name: msg.function.name.clone(),
            arguments,
        }
    }
}

/// One assistant reply from the completion endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallMessage>,
    pub usage: Option<Usage>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(calls: Vec<ToolCallMessage>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl ToolCallMessage {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCallMessage {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }
}
