//! Participant agent
//!
//! A [`ChatAgent`] answers one instruction from the manager per turn. Inside
//! a turn it runs a think-act-observe loop:
//!
//! 1. Call the model (bounded by the per-call timeout)
//! 2. A tool call is dispatched and its result fed back
//! 3. A plain reply ends the turn
//!
//! # Limits
//!
//! - 10 iterations per turn
//! - 5MB per tool result and per reply

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::WorkingMemory;
use crate::llm::{LLMProvider, LLMResponse, Message};
use crate::orchestrator::{EventSink, WorkflowEvent};
use crate::tools::ToolRegistry;
use sdk::errors::EngineError;

/// Maximum number of model calls per turn
pub const MAX_ITERATIONS: usize = 10;

/// Maximum result size in bytes (5MB)
pub const MAX_RESULT_SIZE: usize = 5 * 1024 * 1024;

/// Longest tool result echoed into an `agent_delta` event
const DELTA_PREVIEW_BYTES: usize = 500;

/// One line of the team conversation that agents see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub content: String,
}

impl TranscriptEntry {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }
}

/// A configured participant
#[derive(Clone)]
pub struct ChatAgent {
    pub name: String,
    pub description: String,
    pub instructions: String,
    tools: ToolRegistry,
    client: Arc<dyn LLMProvider>,
    llm_timeout: Duration,
}

impl std::fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tools.names())
            .field("model", &self.client.model())
            .finish()
    }
}

impl ChatAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
        client: Arc<dyn LLMProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            tools: ToolRegistry::empty(),
            client,
            llm_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn system_prompt(&self) -> String {
        let tools = self.tools.system_prompt();
        let mut prompt = format!(
            "You are {}, a member of a team of agents working on a task for a user.\n{}",
            self.name, self.instructions
        );
        if !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tools);
        }
        prompt
    }

    /// Run one turn: answer `instruction` given the team `transcript`.
    ///
    /// Tool calls and their results are reported on `events` as agent deltas.
    pub async fn run(
        &self,
        transcript: &[TranscriptEntry],
        instruction: &str,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        info!("{} starting turn", self.name);

        let mut memory = WorkingMemory::new();
        memory.pin(Message::system(self.system_prompt()));
        if !transcript.is_empty() {
            let history = transcript
                .iter()
                .map(|e| format!("[{}]\n{}", e.speaker, e.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            memory.pin(Message::user(format!("Team conversation so far:\n\n{}", history)));
        }
        memory.pin(Message::user(instruction));

        for iteration in 1..=MAX_ITERATIONS {
            debug!("{} iteration {}/{}", self.name, iteration, MAX_ITERATIONS);

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(EngineError::Cancelled(format!("{} interrupted", self.name)));
                }
                result = timeout(self.llm_timeout, self.client.generate(memory.messages())) => {
                    match result {
                        Ok(Ok(response)) => response,
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => {
                            warn!("{} LLM call timed out after {:?}", self.name, self.llm_timeout);
                            return Err(EngineError::LLMTimeout);
                        }
                    }
                }
            };

            match response {
                LLMResponse::ToolCall(call) if !self.tools.is_empty() => {
                    debug!("{} tool call: {} ({})", self.name, call.name, call.id);
                    events
                        .emit(WorkflowEvent::AgentDelta {
                            agent_id: self.name.clone(),
                            text: format!("Calling {} {}", call.name, call.arguments),
                        })
                        .await;

                    memory.push(Message::assistant(
                        serde_json::json!({
                            "function": &call.name,
                            "arguments": serde_json::from_str::<serde_json::Value>(&call.arguments)
                                .unwrap_or_default()
                        })
                        .to_string(),
                    ));

                    let result = self.tools.dispatch(&call.name, &call.arguments).await;
                    check_size(result.len())?;

                    events
                        .emit(WorkflowEvent::AgentDelta {
                            agent_id: self.name.clone(),
                            text: crate::tools::truncate(&result, DELTA_PREVIEW_BYTES),
                        })
                        .await;

                    memory.push(Message::tool_result(result, call.id));
                }
                LLMResponse::ToolCall(call) => {
                    // No tools: hand the raw request back as the reply
                    debug!("{} asked for tool {} but has none", self.name, call.name);
                    return Ok(format!(
                        "{{\"function\": \"{}\", \"arguments\": {}}}",
                        call.name, call.arguments
                    ));
                }
                LLMResponse::FinalAnswer(answer) => {
                    check_size(answer.content.len())?;
                    info!("{} finished turn after {} iterations", self.name, iteration);
                    return Ok(answer.content);
                }
            }
        }

        warn!("{} exceeded {} iterations", self.name, MAX_ITERATIONS);
        Err(EngineError::MaxIterationsExceeded)
    }
}

fn check_size(size: usize) -> Result<(), EngineError> {
    if size > MAX_RESULT_SIZE {
        return Err(EngineError::ResultSizeExceeded {
            size,
            limit: MAX_RESULT_SIZE,
        });
    }
    Ok(())
}
