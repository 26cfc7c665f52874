//! Site evolution agents
//!
//! A fixed pipeline of LLM agents that studies a website and its codebase,
//! compares it with competitors and produces ranked, feasibility-checked
//! recommendations. The `sea` binary is a thin CLI over [`orchestrator`].

pub mod agents;
pub mod browser;
pub mod budget;
pub mod codebase;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod progress;
pub mod schemas;
pub mod util;
