//! Gemini `generateContent` binding. Sessions are client-side: the
//! full content history is replayed on every request, with the model's
//! own turns carried back verbatim so function calls keep their
//! context.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::llm::{
    ChatModel, ChatRole, ChatTurn, ModelError, ModelReply, ModelSession, ToolCallRequest,
    ToolResultPart,
};
use crate::tools::ToolDeclaration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| ModelError::Transport(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

fn parse_content(content: &Value) -> Result<ModelReply, ModelError> {
    let parts = content["parts"].as_array().ok_or_else(|| {
        ModelError::InvalidResponse("candidate content has no parts".to_string())
    })?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(text) = part["text"].as_str() {
            text_parts.push(text);
        }
        if let Some(call) = part.get("functionCall") {
            let name = call["name"].as_str().ok_or_else(|| {
                ModelError::InvalidResponse("functionCall without a name".to_string())
            })?;
            tool_calls.push(ToolCallRequest {
                name: name.to_string(),
                args: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    let text = if text_parts.is_empty() { None } else { Some(text_parts.join("")) };
    Ok(ModelReply { text, tool_calls })
}

fn turn_to_content(turn: &ChatTurn) -> Value {
    let role = match turn.role {
        ChatRole::Caller => "user",
        ChatRole::Assistant => "model",
    };
    json!({ "role": role, "parts": [{ "text": turn.text }] })
}

fn declarations_to_tools(declarations: &[ToolDeclaration]) -> Value {
    let function_declarations: Vec<Value> = declarations
        .iter()
        .map(|decl| {
            json!({
                "name": decl.name,
                "description": decl.description,
                "parameters": decl.parameters,
            })
        })
        .collect();
    json!([{ "functionDeclarations": function_declarations }])
}

/// Sessions hold cloned handles rather than borrowing the model, so
/// they can be boxed without a lifetime.
struct GeminiSession {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    contents: Vec<Value>,
    tools: Value,
}

impl GeminiSession {
    async fn generate(&self) -> Result<(ModelReply, Value), ModelError> {
        let body = json!({ "contents": self.contents, "tools": self.tools });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status: status.as_u16(), message });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let content = payload["candidates"][0]["content"].clone();
        if content.is_null() {
            return Err(ModelError::InvalidResponse(
                "response carried no candidate content".to_string(),
            ));
        }

        Ok((parse_content(&content)?, content))
    }
}

#[async_trait]
impl ModelSession for GeminiSession {
    async fn send_text(&mut self, text: &str) -> Result<ModelReply, ModelError> {
        self.contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));

        let (reply, content) = self.generate().await?;
        self.contents.push(content);
        Ok(reply)
    }

    async fn send_tool_results(
        &mut self,
        results: Vec<ToolResultPart>,
    ) -> Result<ModelReply, ModelError> {
        let parts: Vec<Value> = results
            .into_iter()
            .map(|result| {
                json!({
                    "functionResponse": {
                        "name": result.name,
                        "response": result.response,
                    }
                })
            })
            .collect();
        self.contents.push(json!({ "role": "user", "parts": parts }));

        let (reply, content) = self.generate().await?;
        self.contents.push(content);
        Ok(reply)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn begin(
        &self,
        directive: &str,
        transcript: &[ChatTurn],
        declarations: &[ToolDeclaration],
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        let mut contents = vec![
            json!({ "role": "user", "parts": [{ "text": directive }] }),
            json!({
                "role": "model",
                "parts": [{ "text": crate::directive::ACKNOWLEDGMENT }]
            }),
        ];
        contents.extend(transcript.iter().map(turn_to_content));

        Ok(Box::new(GeminiSession {
            client: self.client.clone(),
            endpoint: self.endpoint(),
            api_key: self.api_key.clone(),
            contents,
            tools: declarations_to_tools(declarations),
        }))
    }
}
