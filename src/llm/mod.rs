//! Completion client, agent loop and output parsing.

pub mod agentic;
pub mod backoff;
pub mod client;
pub mod dry_run;
pub mod messages;
pub mod models;
pub mod parse;
#[cfg(test)]
pub(crate) mod scripted;
pub mod tools;

pub use client::{CompletionBackend, LlmClient, OpenAiBackend};
pub use dry_run::DryRunBackend;
pub use models::{TokenTally, Usage};
