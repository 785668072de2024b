//! Chat model client layer
//!
//! The orchestrator's manager and every participant agent talk to a model
//! through [`LLMProvider`]. Two hosted backends speak the chat-completions
//! protocol: plain OpenAI and Azure OpenAI deployments.
//!
//! Providers only return text. [`LLMProvider::generate`] layers tool call
//! detection on top so the agent loop can tell a tool request from an answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::LLMConfig;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;

pub mod azure;
pub mod openai;

pub use azure::AzureOpenAIProvider;
pub use openai::OpenAIProvider;

/// Environment variable holding the OpenAI key
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the Azure OpenAI key
pub const AZURE_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(e: LLMError) -> Self {
        match e {
            LLMError::Timeout => EngineError::LLMTimeout,
            LLMError::NetworkError(msg) => EngineError::Network(msg),
            other => EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,

    pub content: String,

    /// Set on tool result messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Wire form for chat-completions requests.
    ///
    /// Tool results are sent as user turns: the model asked for the tool in
    /// plain text, so there is no native `tool_calls` entry to answer.
    pub(crate) fn to_api(&self) -> serde_json::Value {
        match self.role {
            MessageRole::Tool => serde_json::json!({
                "role": "user",
                "content": format!(
                    "Tool result ({}):\n{}",
                    self.tool_call_id.as_deref().unwrap_or("call"),
                    self.content
                ),
            }),
            role => serde_json::json!({
                "role": role.to_string(),
                "content": self.content,
            }),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// What the agent loop should do with a model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    ToolCall(ToolCall),
    FinalAnswer(FinalAnswer),
}

/// Tool call request parsed out of model text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,

    /// JSON object, as a string
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,
}

impl FinalAnswer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A chat model backend
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short provider name used in logs ("openai", "azure")
    fn name(&self) -> &str;

    /// Model or deployment the provider talks to
    fn model(&self) -> &str;

    /// Send the history and return the assistant's text
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Like [`complete`](Self::complete), but classifies the reply as a tool
    /// call or a final answer
    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse> {
        let content = self.complete(messages).await?;
        if let Some(tool_call) = parse_tool_calls(&content) {
            return Ok(LLMResponse::ToolCall(tool_call));
        }
        Ok(LLMResponse::FinalAnswer(FinalAnswer::new(content)))
    }

    /// Check if the provider is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Build the provider named by `llm.provider`, resolving its API key
pub fn build_provider(
    config: &LLMConfig,
    secrets: &SecretManager,
) -> std::result::Result<Arc<dyn LLMProvider>, EngineError> {
    match config.provider.as_str() {
        "azure" => {
            if config.azure.endpoint.trim().is_empty() {
                return Err(EngineError::Config(
                    "llm.azure.endpoint is empty; set it or AZURE_OPENAI_ENDPOINT".to_string(),
                ));
            }
            let key = secrets.resolve(AZURE_KEY_ENV, "azure_openai_api_key")?;
            Ok(Arc::new(AzureOpenAIProvider::new(config.azure.clone(), key)))
        }
        "openai" => {
            let key = secrets.resolve(OPENAI_KEY_ENV, "openai_api_key")?;
            Ok(Arc::new(OpenAIProvider::new(config.openai.clone(), key)))
        }
        other => Err(EngineError::Config(format!(
            "Unknown LLM provider '{}'",
            other
        ))),
    }
}

/// Detect a tool call in model output.
///
/// Accepted shapes, in order:
/// 1. The whole reply is `{"function": "...", "arguments": {...}}`
/// 2. That object inside a markdown code fence, with or without prose after it
/// 3. `<tool_call>name({...})</tool_call>`
/// 4. The object embedded somewhere in prose
///
/// `"name"`/`"tool"` are accepted as aliases for `"function"`, since models
/// trained on other conventions drift towards them.
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    if let Some(tc) = parse_tool_call_marker(trimmed) {
        return Some(tc);
    }

    for key in ["{\"function\"", "{\"name\"", "{\"tool\""] {
        if let Some(pos) = trimmed.find(key) {
            if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
                if let Some(tc) = try_parse_function_json(json_str) {
                    return Some(tc);
                }
            }
        }
    }

    None
}

/// First JSON object in model output: the whole reply, a fenced block, or
/// the first balanced `{...}` in prose
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();
    let parse = |s: &str| {
        serde_json::from_str::<serde_json::Value>(s.trim())
            .ok()
            .filter(|v| v.is_object())
    };

    if let Some(v) = parse(trimmed) {
        return Some(v);
    }
    if let Some(v) = extract_fenced_json(trimmed).and_then(parse) {
        return Some(v);
    }
    let start = trimmed.find('{')?;
    extract_balanced_json(&trimmed[start..]).and_then(parse)
}

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4())
}

fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = ["function", "name", "tool"]
        .iter()
        .find_map(|k| json.get(*k).and_then(|v| v.as_str()))?;
    let arguments = json.get("arguments")?;
    // Some models double-encode the arguments object
    let arguments = match arguments {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(ToolCall::new(new_call_id(), function, arguments))
}

fn parse_tool_call_marker(s: &str) -> Option<ToolCall> {
    let start = s.find("<tool_call>")? + "<tool_call>".len();
    let end = s[start..].find("</tool_call>")? + start;
    let body = s[start..end].trim();

    if let Some(tc) = try_parse_function_json(body) {
        return Some(tc);
    }

    let paren = body.find('(')?;
    let name = body[..paren].trim();
    if name.is_empty() {
        return None;
    }
    let args_end = body.rfind(')').unwrap_or(body.len());
    let arguments = body.get(paren + 1..args_end).unwrap_or("{}").trim();
    let arguments = if arguments.is_empty() { "{}" } else { arguments };

    Some(ToolCall::new(new_call_id(), name, arguments))
}

/// Body of the first markdown code fence, tolerating prose after the fence
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Balanced `{...}` object at the start of `s`, respecting string literals
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Map a non-success HTTP status to an [`LLMError`]
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> LLMError {
    let body = crate::secrets::scrub(&body);
    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed(body),
        429 => LLMError::RateLimitExceeded,
        500..=599 => LLMError::ProviderUnavailable(format!("{}: {}", status, body)),
        _ => LLMError::InvalidRequest(body),
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response
pub(crate) fn extract_content(data: &serde_json::Value) -> Result<String> {
    let choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| LLMError::ParseError("No message in choice".to_string()))?;

    match message.get("content").and_then(|c| c.as_str()) {
        Some(content) => Ok(content.to_string()),
        None => Err(LLMError::ParseError("Empty content".to_string())),
    }
}
