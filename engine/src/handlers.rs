//! Command handlers for CLI operations
//!
//! - serve: run the HTTP API until Ctrl-C
//! - run: execute one task with an agent team, printing every record
//! - teams: list or seed teams
//! - conversations: page through stored conversations
//! - secrets: store or remove API keys in the keychain

use anyhow::{Context, Result};
use sdk::types::{default_agents, AgentConfig, StreamingEvent, UserMessage};
use serde_json::json;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api_server::{self, AppState};
use crate::config::Config;
use crate::db::conversations::NewConversation;
use crate::db::Database;
use crate::llm::{build_provider, LLMProvider};
use crate::orchestrator::{session_workflow, Workflow};
use crate::relay::{current_time, get_agent_icon, Relay};
use crate::secrets::SecretManager;
use crate::session::generate_session_name;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.database_path())
        .await
        .context("Failed to open database")
}

fn build_client(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let secrets = SecretManager::default();
    build_provider(&config.llm, &secrets).context("Failed to configure the LLM provider")
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            token.cancel();
        }
    });
}

/// Run the HTTP API until interrupted
pub async fn handle_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if config.server.auth_token.is_none() {
        warn!("No server.auth_token configured, API requests are not authenticated");
    }

    let database = open_database(&config).await?;
    let client = build_client(&config)?;
    info!("Using {} model {}", client.name(), client.model());

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let state = AppState::new(config, database.clone(), client);
    api_server::serve(state, shutdown).await?;

    database.close().await?;
    Ok(())
}

/// Load an agent list from a JSON file
pub fn load_agents(path: &Path) -> Result<Vec<AgentConfig>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agents file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse agents file {}", path.display()))
}

/// Execute a task from the terminal.
///
/// The session is stored like one started over HTTP, so it shows up in
/// `conversations` and the UI afterwards.
pub async fn handle_run(
    task: String,
    agents_file: Option<PathBuf>,
    run_locally: bool,
    user: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let agents = match agents_file {
        Some(path) => load_agents(&path)?,
        None => default_agents(),
    };
    let user_id = user.unwrap_or_else(|| config.server.default_user.clone());
    let session_id = generate_session_name();

    let database = open_database(config).await?;
    let client = build_client(config)?;

    database
        .conversations()
        .save_message(
            &user_id,
            &session_id,
            &UserMessage::new(&task).into(),
            NewConversation {
                id: None,
                agents: Some(agents.clone()),
                run_mode_locally: Some(run_locally),
                timestamp: current_time(),
            },
        )
        .await?;

    let workflow = session_workflow(config, client, &agents, &user_id, &session_id)?;
    if format == OutputFormat::Text {
        println!("Session {} ({} agents)", session_id, workflow.participants().len());
        println!();
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let relay = Relay::new(database.conversations(), &session_id, &user_id);
    let mut events = workflow.run_stream(&task, cancel);
    let mut last: Option<StreamingEvent> = None;

    // Everything is stored; printing stops at the first terminal record
    while let Some(event) = events.next().await {
        let Some(record) = relay.forward(event).await else {
            continue;
        };
        if last.as_ref().is_some_and(StreamingEvent::is_terminal) {
            continue;
        }
        print_record(&record, format)?;
        last = Some(record);
    }

    database.close().await?;

    match last {
        Some(record) if record.is_completed() => Ok(()),
        Some(record) => Err(anyhow::anyhow!(
            "Session {} ended with {}",
            session_id,
            record.stop_reason.unwrap_or_else(|| record.event_type.clone())
        )),
        None => Err(anyhow::anyhow!("Session {} produced no events", session_id)),
    }
}

fn print_record(record: &StreamingEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(record)?),
        OutputFormat::Text => {
            println!(
                "{} {} [{}] {}",
                record.time,
                get_agent_icon(&record.source),
                record.source,
                record.event_type
            );
            println!("{}", record.content);
            println!();
        }
    }
    Ok(())
}

pub async fn handle_teams_list(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let teams = database.teams().get_teams().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&teams)?),
        OutputFormat::Text => {
            if teams.is_empty() {
                println!("No teams. Run `dreamteam teams init` to create the default team.");
            }
            for team in &teams {
                println!("{} ({})", team.name, team.id.as_deref().unwrap_or("-"));
                if let Some(description) = &team.description {
                    println!("  {}", description);
                }
                for agent in &team.agents {
                    println!("  {} {} [{}]", agent.icon, agent.name, agent.agent_type);
                }
            }
        }
    }
    Ok(())
}

pub async fn handle_teams_init(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let created = database.teams().initialize_teams().await?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "created": created })),
        OutputFormat::Text if created == 0 => println!("Teams already exist, nothing to do."),
        OutputFormat::Text => println!("Created {} team(s).", created),
    }
    Ok(())
}

pub async fn handle_conversations(
    user: Option<String>,
    page: i64,
    page_size: i64,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = open_database(config).await?;
    let listing = database
        .conversations()
        .fetch_user_conversations(user.as_deref(), page, page_size)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Text => {
            println!(
                "Page {}/{} ({} conversations)",
                listing.page, listing.total_pages, listing.total_count
            );
            for conversation in &listing.conversations {
                let task = conversation.task().unwrap_or("");
                let task: String = task.chars().take(60).collect();
                println!(
                    "  {}  {:<32} {:<12} {}",
                    conversation.timestamp, conversation.session_id, conversation.user_id, task
                );
            }
        }
    }
    Ok(())
}

pub fn handle_secrets_set(key: &str, value: Option<String>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => {
            eprintln!("Enter value for {} and press Enter:", key);
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim().to_string()
        }
    };

    SecretManager::default().set_secret(key, &value)?;
    println!("Stored {} in the OS keychain.", key);
    Ok(())
}

pub fn handle_secrets_delete(key: &str) -> Result<()> {
    SecretManager::default().delete_secret(key)?;
    println!("Removed {} from the OS keychain.", key);
    Ok(())
}
