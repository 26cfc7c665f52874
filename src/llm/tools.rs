//! Tool definitions, provider conversion and the handler seam.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;

/// Provider-neutral tool description: a name, a description and a JSON
/// Schema for the argument object.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Tool definition in the provider's function-calling format
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        let parameters = if spec.input_schema.is_object() {
            spec.input_schema.clone()
        } else {
            serde_json::json!({"type": "object", "properties": {}})
        };
        ToolDefinition {
            tool_type: "function",
            function: FunctionDefinition {
                name: spec.name,
                description: spec.description,
                parameters,
            },
        }
    }
}

pub fn to_provider_tools(specs: &[ToolSpec]) -> Vec<ToolDefinition> {
    specs.iter().map(ToolDefinition::from).collect()
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    /// Ordered base64 raster tiles
    Images(Vec<String>),
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

/// A closed set of tool identifiers belonging to one agent.
pub trait ToolKind: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn spec(self) -> ToolSpec;

    fn parse(name: &str) -> Result<Self, ToolError> {
        Self::ALL
            .iter()
            .copied()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

/// Executes tool calls for one agent invocation.
///
/// Recoverable conditions (missing files, fetch failures, exhausted budgets)
/// are reported as `Ok(ToolOutput::Text(..))`. `Err` is reserved for calls
/// that cannot be dispatched at all.
pub trait ToolHandler: Send + Sync {
    fn specs(&self) -> Vec<ToolSpec>;

    fn call<'a>(
        &'a self,
        name: &'a str,
        args: &'a Value,
    ) -> BoxFuture<'a, Result<ToolOutput, ToolError>>;
}

/// Required string argument.
pub fn str_arg<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string argument '{}'", key),
        })
}

/// Schema for a tool taking a single required string argument.
pub fn single_string_schema(key: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            key: {"type": "string", "description": description}
        },
        "required": [key],
    })
}

pub fn empty_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}
