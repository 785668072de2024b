// Dream Team
// Main entry point for the dreamteam binary

use clap::Parser;
use dreamteam_engine::cli::{Cli, Command, SecretAction, TeamAction};
use dreamteam_engine::config::Config;
use dreamteam_engine::handlers::{
    handle_conversations, handle_run, handle_secrets_delete, handle_secrets_set, handle_serve,
    handle_teams_init, handle_teams_list, OutputFormat,
};
use dreamteam_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Secrets commands must work before a valid config exists
    if let Command::Secrets { action } = &cli.command {
        init_telemetry_with_level(cli.log.as_deref().unwrap_or("warn"));
        return match action {
            SecretAction::Set { key, value } => handle_secrets_set(key, value.clone()),
            SecretAction::Delete { key } => handle_secrets_delete(key),
        };
    }

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log overrides the configured level; RUST_LOG overrides both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!(
        "Dream Team v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Serve { host, port } => handle_serve(config, host, port).await,

        Command::Run {
            task,
            agents,
            run_locally,
            user,
        } => {
            tracing::info!("Executing task: {}", task);
            handle_run(task, agents, run_locally, user, &config, format).await
        }

        Command::Teams { action } => match action {
            TeamAction::List => handle_teams_list(&config, format).await,
            TeamAction::Init => handle_teams_init(&config, format).await,
        },

        Command::Conversations {
            user,
            page,
            page_size,
        } => handle_conversations(user, page, page_size, &config, format).await,

        Command::Secrets { .. } => Ok(()),
    }
}
