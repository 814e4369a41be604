//! Model seam. The orchestrator talks to [`ChatModel`] and
//! [`ModelSession`] only; the Gemini binding and the scripted test
//! double both live behind these traits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolDeclaration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    Caller,
    Assistant,
}

#[derive(Clone, Debug)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: Value,
}

#[derive(Clone, Debug)]
pub struct ToolResultPart {
    pub name: String,
    pub response: Value,
}

/// One model turn: free text, tool calls, or both.
#[derive(Clone, Debug, Default)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text_reply(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), tool_calls: Vec::new() }
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ToolCallRequest { name: name.into(), args }],
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model response could not be interpreted: {0}")]
    InvalidResponse(String),
}

/// A live multi-turn exchange. Tool results go back into the same
/// session so the model keeps its own call context.
#[async_trait]
pub trait ModelSession: Send {
    async fn send_text(&mut self, text: &str) -> Result<ModelReply, ModelError>;

    async fn send_tool_results(
        &mut self,
        results: Vec<ToolResultPart>,
    ) -> Result<ModelReply, ModelError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn begin(
        &self,
        directive: &str,
        transcript: &[ChatTurn],
        declarations: &[ToolDeclaration],
    ) -> Result<Box<dyn ModelSession>, ModelError>;
}

/// Deterministic model for tests: replays a queue of canned replies and
/// records every tool-result batch it receives.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    replies: VecDeque<ModelReply>,
    received_tool_results: Vec<Vec<ToolResultPart>>,
    sent_texts: Vec<String>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self { state: Arc::new(Mutex::new(ScriptState { replies: replies.into(), ..ScriptState::default() })) }
    }

    pub fn received_tool_results(&self) -> Vec<Vec<ToolResultPart>> {
        match self.state.lock() {
            Ok(state) => state.received_tool_results.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.sent_texts.clone(),
            Err(_) => Vec::new(),
        }
    }

    fn next_reply(&self) -> Result<ModelReply, ModelError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ModelError::Transport("scripted model state poisoned".to_string()))?;
        state
            .replies
            .pop_front()
            .ok_or_else(|| ModelError::InvalidResponse("script exhausted".to_string()))
    }
}

struct ScriptedSession {
    model: ScriptedModel,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn send_text(&mut self, text: &str) -> Result<ModelReply, ModelError> {
        if let Ok(mut state) = self.model.state.lock() {
            state.sent_texts.push(text.to_string());
        }
        self.model.next_reply()
    }

    async fn send_tool_results(
        &mut self,
        results: Vec<ToolResultPart>,
    ) -> Result<ModelReply, ModelError> {
        if let Ok(mut state) = self.model.state.lock() {
            state.received_tool_results.push(results);
        }
        self.model.next_reply()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn begin(
        &self,
        _directive: &str,
        _transcript: &[ChatTurn],
        _declarations: &[ToolDeclaration],
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        Ok(Box::new(ScriptedSession { model: self.clone() }))
    }
}
