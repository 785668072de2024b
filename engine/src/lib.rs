//! Dream Team Engine Library
//!
//! Multi-agent chat orchestration behind an HTTP API. Used by the
//! `dreamteam` binary and by integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// File system security module
pub mod fs_guard;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Tools available to participant agents
pub mod tools;

/// Participant agents and the agent factory
pub mod agent;

/// Workflow seam and the standard team manager
pub mod orchestrator;

/// Session names and the running session registry
pub mod session;

/// Workflow event to record conversion and persistence
pub mod relay;

/// HTTP API
pub mod api_server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
