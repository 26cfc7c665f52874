//! Run progress reporting and user questions.
//!
//! Both are passed explicitly to every agent that may need them. A tool
//! handler that has to ask the user something pauses the display through
//! the sink it was given.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::models::TokenTally;

/// Answer returned to the model when nobody can be asked.
pub const NON_INTERACTIVE_ANSWER: &str = "(No user input available, running in non-interactive mode. Please proceed with your best judgment.)";

const EMPTY_ANSWER: &str = "(No answer provided.)";

/// Token totals for one agent, as written to the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Receives progress events from the orchestrator and agents.
pub trait ProgressSink: Send + Sync {
    fn phase(&self, label: &str);
    fn start_agent(&self, agent: &str, detail: &str);
    fn update_agent(&self, agent: &str, detail: &str);
    fn log_event(&self, agent: &str, message: &str);
    fn finish_agent(&self, agent: &str, summary: &str);
    fn fail_agent(&self, agent: &str, error: &str);

    /// Called once per agent invocation with the final tally.
    fn record_tokens(&self, agent: &str, tally: &TokenTally);

    /// Stop writing to the terminal until `resume`.
    fn pause(&self) {}
    fn resume(&self) {}

    fn token_usage(&self) -> BTreeMap<String, TokenUsage> {
        BTreeMap::new()
    }
}

#[derive(Default)]
struct ConsoleState {
    paused: bool,
    buffered: Vec<String>,
    tokens: BTreeMap<String, TokenUsage>,
}

/// Line-oriented progress on stderr, mirrored into `tracing`.
#[derive(Default)]
pub struct ConsoleProgress {
    state: Mutex<ConsoleState>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ConsoleState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn emit(&self, line: String) {
        self.with_state(|state| {
            if state.paused {
                state.buffered.push(line);
            } else {
                eprintln!("{}", line);
            }
        });
    }
}

impl ProgressSink for ConsoleProgress {
    fn phase(&self, label: &str) {
        info!(phase = label, "Phase started");
        self.emit(format!("\n▸ {}", label));
    }

    fn start_agent(&self, agent: &str, detail: &str) {
        info!(agent, "{}", detail);
        self.emit(format!("  ◐ {}: {}", agent, detail));
    }

    fn update_agent(&self, agent: &str, detail: &str) {
        debug!(agent, "{}", detail);
        self.emit(format!("    {} · {}", agent, detail));
    }

    fn log_event(&self, agent: &str, message: &str) {
        debug!(agent, "{}", message);
    }

    fn finish_agent(&self, agent: &str, summary: &str) {
        info!(agent, "Finished: {}", summary);
        self.emit(format!("  ✓ {}: {}", agent, summary));
    }

    fn fail_agent(&self, agent: &str, error: &str) {
        warn!(agent, "Failed: {}", error);
        self.emit(format!("  ✗ {}: {}", agent, error));
    }

    fn record_tokens(&self, agent: &str, tally: &TokenTally) {
        debug!(
            agent,
            input = tally.input(),
            output = tally.output(),
            calls = tally.calls(),
            "Token usage"
        );
        self.with_state(|state| {
            let entry = state.tokens.entry(agent.to_string()).or_default();
            entry.input_tokens += tally.input();
            entry.output_tokens += tally.output();
        });
    }

    fn pause(&self) {
        self.with_state(|state| state.paused = true);
    }

    fn resume(&self) {
        let lines = self.with_state(|state| {
            state.paused = false;
            std::mem::take(&mut state.buffered)
        });
        for line in lines {
            eprintln!("{}", line);
        }
    }

    fn token_usage(&self) -> BTreeMap<String, TokenUsage> {
        self.with_state(|state| state.tokens.clone())
    }
}

/// Answers questions an agent wants to put to the user.
pub trait UserPrompt: Send + Sync {
    /// Whether a human can actually answer.
    fn is_interactive(&self) -> bool;

    fn ask<'a>(&'a self, question: &'a str, progress: &'a dyn ProgressSink)
        -> BoxFuture<'a, String>;
}

/// Reads answers from the terminal.
pub struct StdinPrompt {
    interactive: bool,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }

    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn read_answer(question: &str) -> Option<String> {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n  ? {}", question);
    let _ = write!(stderr, "  > ");
    let _ = stderr.flush();

    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

impl UserPrompt for StdinPrompt {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn ask<'a>(
        &'a self,
        question: &'a str,
        progress: &'a dyn ProgressSink,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            if !self.interactive {
                return NON_INTERACTIVE_ANSWER.to_string();
            }

            progress.pause();
            let owned = question.to_string();
            let answer = tokio::task::spawn_blocking(move || read_answer(&owned))
                .await
                .ok()
                .flatten();
            progress.resume();

            match answer {
                None => NON_INTERACTIVE_ANSWER.to_string(),
                Some(a) if a.is_empty() => EMPTY_ANSWER.to_string(),
                Some(a) => a,
            }
        })
    }
}

/// Gives the same answer to every question.
pub struct FixedAnswer(pub String);

impl UserPrompt for FixedAnswer {
    fn is_interactive(&self) -> bool {
        true
    }

    fn ask<'a>(
        &'a self,
        _question: &'a str,
        _progress: &'a dyn ProgressSink,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move { self.0.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::Usage;

    #[test]
    fn test_tokens_accumulate_per_agent() {
        let progress = ConsoleProgress::new();
        let mut tally = TokenTally::default();
        tally.add(Some(&Usage::new(100, 10)));
        progress.record_tokens("Code Analysis", &tally);
        progress.record_tokens("Code Analysis", &tally);
        let usage = progress.token_usage();
        assert_eq!(usage["Code Analysis"].input_tokens, 200);
        assert_eq!(usage["Code Analysis"].output_tokens, 20);
    }

    #[test]
    fn test_pause_buffers_lines() {
        let progress = ConsoleProgress::new();
        progress.pause();
        progress.start_agent("Research", "starting");
        progress.update_agent("Research", "browsing");
        assert_eq!(progress.with_state(|s| s.buffered.len()), 2);
        progress.resume();
        assert!(progress.with_state(|s| s.buffered.is_empty() && !s.paused));
    }

    #[tokio::test]
    async fn test_non_interactive_prompt_answers_fixed_text() {
        let prompt = StdinPrompt::non_interactive();
        let progress = ConsoleProgress::new();
        assert!(!prompt.is_interactive());
        assert_eq!(
            prompt.ask("Who is the audience?", &progress).await,
            NON_INTERACTIVE_ANSWER
        );
    }

    #[tokio::test]
    async fn test_fixed_answer() {
        let prompt = FixedAnswer("developers".to_string());
        let progress = ConsoleProgress::new();
        assert_eq!(prompt.ask("Audience?", &progress).await, "developers");
    }
}
