//! Workflow event relay
//!
//! Every [`WorkflowEvent`] of a run becomes a flat [`StreamingEvent`] record.
//! The record is appended to the session's conversation and then handed to
//! whoever is streaming the run (SSE client or CLI).

use sdk::types::{ConversationMessage, StreamingEvent, STOP_CANCELLED, STOP_COMPLETED, STOP_ERROR};
use tracing::warn;

use crate::db::conversations::{ConversationRepository, NewConversation};
use crate::orchestrator::{WorkflowEvent, ORCHESTRATOR_SOURCE, WORKFLOW_SOURCE};

/// Timestamp format used in every record
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time as written into records
pub fn current_time() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// Icon shown next to a record's source
pub fn get_agent_icon(source: &str) -> &'static str {
    match source {
        ORCHESTRATOR_SOURCE => "🎻",
        "WebSurferAgent" => "🏄‍♂️",
        "CoderAgent" => "👨‍💻",
        "FileSurferAgent" => "📂",
        "user" => "👤",
        _ => "🤖",
    }
}

/// Convert a workflow event into its record. Agent turns without a message
/// produce no record.
pub fn to_record(event: WorkflowEvent, session_id: &str, user_id: &str) -> Option<StreamingEvent> {
    let (event_type, source, content, stop_reason) = match event {
        WorkflowEvent::OrchestratorMessage(text) => {
            ("orchestrator", ORCHESTRATOR_SOURCE.to_string(), text, None)
        }
        WorkflowEvent::AgentDelta { agent_id, text } => ("agent_delta", agent_id, text, None),
        WorkflowEvent::AgentMessage { agent_id, text } => ("agent_message", agent_id, text?, None),
        WorkflowEvent::FinalResult(text) => (
            "final_result",
            WORKFLOW_SOURCE.to_string(),
            text.unwrap_or_default(),
            Some(STOP_COMPLETED),
        ),
        WorkflowEvent::WorkflowOutput(data) => (
            "workflow_output",
            WORKFLOW_SOURCE.to_string(),
            data,
            Some(STOP_COMPLETED),
        ),
        WorkflowEvent::WorkflowCompleted(data) => (
            "workflow_completed",
            WORKFLOW_SOURCE.to_string(),
            data,
            Some(STOP_COMPLETED),
        ),
        WorkflowEvent::Failed(message) => (
            "error",
            WORKFLOW_SOURCE.to_string(),
            message,
            Some(STOP_ERROR),
        ),
        WorkflowEvent::Cancelled => (
            "cancelled",
            WORKFLOW_SOURCE.to_string(),
            format!("Session {} was cancelled.", session_id),
            Some(STOP_CANCELLED),
        ),
    };

    Some(StreamingEvent {
        time: current_time(),
        event_type: event_type.to_string(),
        source,
        content,
        stop_reason: stop_reason.map(str::to_string),
        models_usage: None,
        content_image: None,
        session_id: session_id.to_string(),
        session_user: user_id.to_string(),
    })
}

/// Persists and forwards the records of one session
#[derive(Clone)]
pub struct Relay {
    conversations: ConversationRepository,
    session_id: String,
    user_id: String,
}

impl Relay {
    pub fn new(
        conversations: ConversationRepository,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            conversations,
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Convert, append to the transcript and return the record.
    ///
    /// A failed write is logged and the record is still returned; the
    /// client should not lose the live stream over a storage hiccup.
    pub async fn forward(&self, event: WorkflowEvent) -> Option<StreamingEvent> {
        let record = to_record(event, &self.session_id, &self.user_id)?;

        let message = ConversationMessage::Event(record.clone());
        let meta = NewConversation {
            timestamp: record.time.clone(),
            ..NewConversation::default()
        };
        if let Err(e) = self
            .conversations
            .save_message(&self.user_id, &self.session_id, &message, meta)
            .await
        {
            warn!("Failed to persist {} event for {}: {:#}", record.event_type, self.session_id, e);
        }

        Some(record)
    }
}
