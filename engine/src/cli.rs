//! CLI interface for Dream Team
//!
//! Defines the commands and global flags of the `dreamteam` binary using
//! clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dream Team multi-agent chat service
///
/// Serves the chat API, or runs a single task against an agent team from
/// the terminal.
#[derive(Parser, Debug)]
#[command(name = "dreamteam")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server
    Serve {
        /// Override the configured listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a task with an agent team and print its events
    Run {
        /// The task to execute
        task: String,

        /// JSON file holding an array of agent configurations
        #[arg(long, value_name = "FILE")]
        agents: Option<PathBuf>,

        /// Record the session as run locally
        #[arg(long)]
        run_locally: bool,

        /// User the session is stored under
        #[arg(long)]
        user: Option<String>,
    },

    /// Manage teams
    Teams {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// List stored conversations
    Conversations {
        /// Only show conversations of this user
        #[arg(long)]
        user: Option<String>,

        #[arg(long, default_value = "1")]
        page: i64,

        #[arg(long, default_value = "20")]
        page_size: i64,
    },

    /// Manage API keys in the OS keychain
    Secrets {
        #[command(subcommand)]
        action: SecretAction,
    },
}

/// Team management actions
#[derive(Subcommand, Debug)]
pub enum TeamAction {
    /// List all teams
    List,

    /// Seed the default team into an empty store
    Init,
}

/// Secret management actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a secret (e.g. azure_openai_api_key, openai_api_key)
    Set {
        key: String,

        /// Secret value; read from stdin when omitted
        #[arg(long)]
        value: Option<String>,
    },

    /// Remove a stored secret
    Delete { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["dreamteam", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Serve {
                host: None,
                port: None
            }
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "dreamteam",
            "teams",
            "list",
            "--json",
            "--log",
            "debug",
            "--config",
            "/tmp/dt.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dt.toml")));
        assert!(matches!(
            cli.command,
            Command::Teams {
                action: TeamAction::List
            }
        ));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::try_parse_from([
            "dreamteam",
            "run",
            "Summarize the data",
            "--agents",
            "team.json",
            "--run-locally",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                task,
                agents,
                run_locally,
                user,
            } => {
                assert_eq!(task, "Summarize the data");
                assert_eq!(agents, Some(PathBuf::from("team.json")));
                assert!(run_locally);
                assert!(user.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_conversations_defaults() {
        let cli = Cli::try_parse_from(["dreamteam", "conversations", "--user", "user123"]).unwrap();
        match cli.command {
            Command::Conversations {
                user,
                page,
                page_size,
            } => {
                assert_eq!(user.as_deref(), Some("user123"));
                assert_eq!(page, 1);
                assert_eq!(page_size, 20);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_secrets_set() {
        let cli = Cli::try_parse_from([
            "dreamteam",
            "secrets",
            "set",
            "openai_api_key",
            "--value",
            "sk-test",
        ])
        .unwrap();
        match cli.command {
            Command::Secrets {
                action: SecretAction::Set { key, value },
            } => {
                assert_eq!(key, "openai_api_key");
                assert_eq!(value.as_deref(), Some("sk-test"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
