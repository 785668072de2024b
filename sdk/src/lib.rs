//! Dream Team SDK
//!
//! Shared domain records and error types for the Dream Team engine.
//! Anything that crosses the HTTP boundary or lands in the conversation
//! store is defined here so the engine and its clients agree on the shape.

/// Error types and handling
pub mod errors;

/// Agent, team, conversation and streaming event records
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{
    default_agents, AgentConfig, AgentType, Conversation, ConversationMessage, ConversationPage,
    StreamingEvent, Team, UserMessage,
};
