//! Error taxonomy for the completion client, the agent loop and tool dispatch.
//!
//! Orchestration code works in `anyhow::Result`; these typed errors exist so
//! callers can tell recoverable conditions apart from fatal ones.

use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a completion backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request itself exceeds the model's limits. Waiting will not help.
    #[error("request too large for the model context: {0}")]
    PayloadTooLarge(String),

    /// Pacing/quota rejection. `retry_after` carries the provider hint, if any.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Connection failures and timeouts.
    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    pub fn is_transient_network(&self) -> bool {
        matches!(self, LlmError::Network(_))
    }
}

/// The final model text could not be turned into the expected structure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not extract JSON from model response (length={length}). First 300 chars: {prefix:?}")]
    NoJson { length: usize, prefix: String },

    #[error("response JSON does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Failures that escape one agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent} did not finish within {max} iterations")]
    IterationLimit { agent: String, max: usize },

    #[error("{agent} output could not be parsed after a reformat retry: {source}")]
    Parse {
        agent: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl AgentError {
    pub fn is_iteration_limit(&self) -> bool {
        matches!(self, AgentError::IterationLimit { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, AgentError::Parse { .. })
    }
}

/// Tool dispatch failures. The agent loop turns these into `Error: ...` text.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    Failed(String),
}
