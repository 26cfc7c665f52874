//! Typed outputs for every agent, plus pipeline state and the final report.
//!
//! Models are lenient the way the agents need them to be: optional fields
//! default, and a few fields accept either a string or a number.

pub mod code_analysis;
pub mod feasibility;
pub mod pipeline;
pub mod quality;
pub mod recommendations;
pub mod research;
pub mod tech_stack;
pub mod ux_design;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept `null` for a string field.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a string, a number, a bool or `null` for a string field.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}
