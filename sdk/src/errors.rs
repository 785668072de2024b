//! Error types and handling
//!
//! This module provides the error types used throughout the Dream Team engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints never echo the wrapped message, so API keys, file paths and raw
//! model output stay out of anything shown to an end user.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including a user-friendly hint
/// and recoverability information.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require a configuration change or restart.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: SQLite operation failures
/// - **LLM Provider**: API failures, authentication errors, timeouts
/// - **Orchestration**: Workflow construction and run failures
/// - **Tools**: Tool dispatch and file system guard errors
/// - **Requests**: Missing records and malformed input
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
/// use std::path::PathBuf;
///
/// let error = EngineError::PathDenied(PathBuf::from(".ssh"));
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("missing endpoint".into());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Agent loop errors
    #[error("Max iterations exceeded")]
    MaxIterationsExceeded,

    #[error("Result size exceeded: {size} bytes > {limit} bytes")]
    ResultSizeExceeded { size: usize, limit: usize },

    // Orchestration errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Session cancelled: {0}")]
    Cancelled(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // File system security errors
    #[error("Path denied: {0:?}")]
    PathDenied(std::path::PathBuf),

    #[error("Path outside workspace: {0:?}")]
    PathOutsideWorkspace(std::path::PathBuf),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // Request errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Database(_) => "Database operation failed. Try restarting the server",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",

            Self::MaxIterationsExceeded => "Task too complex. Try breaking it into smaller steps",
            Self::ResultSizeExceeded { .. } => "Result too large. Try a more specific query",

            Self::Workflow(_) => "The agent team could not complete the task",
            Self::Cancelled(_) => "The session was stopped",

            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",

            Self::PathDenied(_) => "Access to this path is not allowed",
            Self::PathOutsideWorkspace(_) => "Operation must be within the data directory",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            Self::NotFound(_) => "The requested record does not exist",
            Self::InvalidRequest(_) => "The request was malformed",

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::Network(_) => "Network operation failed. Check your connection",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::KeyringError(_))
    }
}
