//! JSON extraction from free-form model text, with a single reformat retry.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::client::LlmClient;
use super::messages::ConversationTurn;
use super::models::TokenTally;
use crate::agents::AgentKind;
use crate::error::{AgentError, ParseError};
use crate::util::{cached_regex, truncate_str};

pub const REFORMAT_INSTRUCTION: &str = "Your analysis is excellent, but I need the output as a single JSON object (no markdown, no explanation, just raw JSON) matching the schema described in your instructions. Please re-format your response now.";

const PREFIX_CHARS: usize = 300;

static FENCE_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Parse the first complete JSON value at the start of `text`, ignoring
/// anything after it.
fn first_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
}

fn strict_or_prefix(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| first_value(text))
}

/// Pull a JSON value out of model text.
///
/// Tries, in order: the whole text when it opens with `{`, each fenced
/// code block, then the first `{` anywhere.
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        if let Some(value) = strict_or_prefix(trimmed) {
            return Ok(value);
        }
    }

    if let Some(re) = cached_regex(&FENCE_RE, r"(?s)```(?:json)?\s*\n?(.*?)\n?```") {
        for caps in re.captures_iter(trimmed) {
            if let Some(value) = caps.get(1).and_then(|m| strict_or_prefix(m.as_str().trim())) {
                return Ok(value);
            }
        }
    }

    if let Some(start) = trimmed.find('{') {
        if let Some(value) = first_value(&trimmed[start..]) {
            return Ok(value);
        }
    }

    Err(ParseError::NoJson {
        length: text.len(),
        prefix: truncate_str(text, PREFIX_CHARS).to_string(),
    })
}

/// Extract and validate into a typed output.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let value = extract_json(text)?;
    Ok(serde_json::from_value(value)?)
}

/// Parse `raw`; on failure re-prompt once with the reformat instruction.
///
/// `conversation` is the agent's opening turns. The retry call offers no
/// tools. A second failure is returned as `AgentError::Parse`.
pub async fn parse_with_retry<T: DeserializeOwned>(
    client: &LlmClient,
    agent: AgentKind,
    conversation: &[ConversationTurn],
    raw: String,
    tally: &mut TokenTally,
) -> Result<T, AgentError> {
    let first_err = match parse_as::<T>(&raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    warn!(
        agent = agent.label(),
        length = raw.len(),
        "Output did not parse ({}), asking for a reformat",
        first_err
    );

    let mut turns = conversation.to_vec();
    turns.push(ConversationTurn::assistant(raw));
    turns.push(ConversationTurn::user(REFORMAT_INSTRUCTION));

    let reply = client.complete(agent, &turns, &[], true).await?;
    tally.add(reply.usage.as_ref());
    let retry_text = reply.content.unwrap_or_default();

    parse_as::<T>(&retry_text).map_err(|source| AgentError::Parse {
        agent: agent.label().to_string(),
        source,
    })
}
