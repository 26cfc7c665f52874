//! In-memory completion backend that replays queued replies per agent.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;

use super::client::{CompletionBackend, CompletionRequest};
use super::messages::AssistantMessage;
use crate::agents::AgentKind;
use crate::error::LlmError;

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<AgentKind, VecDeque<Result<AssistantMessage, LlmError>>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, agent: AgentKind, reply: AssistantMessage) {
        self.push_result(agent, Ok(reply));
    }

    pub fn push_err(&self, agent: AgentKind, err: LlmError) {
        self.push_result(agent, Err(err));
    }

    fn push_result(&self, agent: AgentKind, reply: Result<AssistantMessage, LlmError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(agent)
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_for(&self, agent: AgentKind) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent == agent)
            .count()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<AssistantMessage, LlmError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .get_mut(&request.agent)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Err(LlmError::Api {
                        status: 500,
                        message: format!("no scripted reply for {}", request.agent.label()),
                    })
                })
        })
    }
}
