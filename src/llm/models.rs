use serde::{Deserialize, Serialize};

/// API usage information from the completion provider.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default, alias = "input_tokens")]
    pub prompt_tokens: u64,
    #[serde(default, alias = "output_tokens")]
    pub completion_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Token counts accumulated over one logical agent invocation.
///
/// Only grows. A fresh tally is created for every invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TokenTally {
    input: u64,
    output: u64,
    calls: u32,
}

impl TokenTally {
    /// Count one completion call; `usage` is absent when the provider omits it.
    pub fn add(&mut self, usage: Option<&Usage>) {
        self.calls += 1;
        if let Some(usage) = usage {
            self.input += usage.prompt_tokens;
            self.output += usage.completion_tokens;
        }
    }

    pub fn input(&self) -> u64 {
        self.input
    }

    pub fn output(&self) -> u64 {
        self.output
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }
}
