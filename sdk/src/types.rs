//! Domain records shared by the engine and its clients
//!
//! These are the shapes that travel over the HTTP API and are persisted in
//! the conversation store. Field names follow the wire format the chat UI
//! already consumes, so renames here are breaking changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stop reason carried by the final event of a successful run
pub const STOP_COMPLETED: &str = "completed";

/// Stop reason carried by the final event of a cancelled run
pub const STOP_CANCELLED: &str = "cancelled";

/// Stop reason carried by the final event of a failed run
pub const STOP_ERROR: &str = "error";

/// Kind of participant an agent configuration describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgentType {
    /// Built-in agent, dispatched by name (Coder, WebSurfer, FileSurfer)
    MagenticOne,

    /// Prompt-only agent with caller supplied instructions
    Custom,

    /// Custom agent that can also send email
    #[serde(rename = "CustomMCP")]
    CustomMcp,

    /// Agent with a knowledge base search tool
    #[serde(rename = "RAG")]
    Rag,

    /// Any type this build does not know about; skipped when agents are built
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::MagenticOne => write!(f, "MagenticOne"),
            AgentType::Custom => write!(f, "Custom"),
            AgentType::CustomMcp => write!(f, "CustomMCP"),
            AgentType::Rag => write!(f, "RAG"),
            AgentType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One agent entry of a team or session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    #[serde(default)]
    pub input_key: String,

    #[serde(rename = "type")]
    pub agent_type: AgentType,

    pub name: String,

    #[serde(default)]
    pub system_message: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub icon: String,
}

impl AgentConfig {
    /// Create a config with empty prompt fields
    pub fn new(
        input_key: impl Into<String>,
        agent_type: AgentType,
        name: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            input_key: input_key.into(),
            agent_type,
            name: name.into(),
            system_message: String::new(),
            description: String::new(),
            icon: icon.into(),
        }
    }
}

/// The team used when a session or team does not name its own agents
pub fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("0001", AgentType::MagenticOne, "Coder", "👨‍💻"),
        AgentConfig::new("0002", AgentType::MagenticOne, "WebSurfer", "🏄‍♂️"),
        AgentConfig::new("0003", AgentType::MagenticOne, "FileSurfer", "📂"),
    ]
}

/// Flat record emitted for every orchestration event.
///
/// Every key is always serialized; absent optionals are written as `null`
/// because clients index the object directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingEvent {
    pub time: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub stop_reason: Option<String>,

    #[serde(default)]
    pub models_usage: Option<String>,

    #[serde(default)]
    pub content_image: Option<String>,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub session_user: String,
}

impl StreamingEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Whether the run finished normally
    pub fn is_completed(&self) -> bool {
        self.stop_reason.as_deref() == Some(STOP_COMPLETED)
    }
}

/// The task message that opens every conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMessage {
    pub content: String,
    pub role: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: "user".to_string(),
        }
    }
}

/// An entry of a conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConversationMessage {
    User(UserMessage),
    Event(StreamingEvent),
}

impl From<UserMessage> for ConversationMessage {
    fn from(m: UserMessage) -> Self {
        ConversationMessage::User(m)
    }
}

impl From<StreamingEvent> for ConversationMessage {
    fn from(e: StreamingEvent) -> Self {
        ConversationMessage::Event(e)
    }
}

/// A persisted session transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<ConversationMessage>,
    pub agents: Option<Vec<AgentConfig>>,
    pub run_mode_locally: Option<bool>,
    pub timestamp: String,
}

impl Conversation {
    /// The task text: content of the first user message
    pub fn task(&self) -> Option<&str> {
        self.messages.iter().find_map(|m| match m {
            ConversationMessage::User(u) => Some(u.content.as_str()),
            ConversationMessage::Event(_) => None,
        })
    }
}

/// One page of a conversation listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub total_count: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl ConversationPage {
    /// The page returned when listing fails or there is nothing to list
    pub fn empty() -> Self {
        Self {
            conversations: Vec::new(),
            total_count: 0,
            page: 1,
            total_pages: 1,
        }
    }
}

/// A named, reusable set of agents.
///
/// Teams are documents: fields the engine does not know about are kept in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Team {
    pub fn new(name: impl Into<String>, agents: Vec<AgentConfig>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            agents,
            extra: serde_json::Map::new(),
        }
    }
}
