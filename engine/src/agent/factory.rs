//! Agent configuration dispatch
//!
//! | type          | name       | agent              | tools                      |
//! |---------------|------------|--------------------|----------------------------|
//! | `MagenticOne` | Coder      | `CoderAgent`       | `execute_code`             |
//! | `MagenticOne` | WebSurfer  | `WebSurferAgent`   | `fetch_url`                |
//! | `MagenticOne` | FileSurfer | `FileSurferAgent`  | `read_file`, `list_files`  |
//! | `Custom`      | any        | `{name}Agent`      | none                       |
//! | `CustomMCP`   | any        | `{name}Agent`      | `send_email`               |
//! | `RAG`         | any        | `{name}Agent`      | `search_knowledge_base`    |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ChatAgent;
use crate::config::ToolsConfig;
use crate::fs_guard::FileSystemGuard;
use crate::llm::LLMProvider;
use crate::tools::{
    ExecuteCodeTool, FetchUrlTool, ListFilesTool, ReadFileTool, SearchKnowledgeBaseTool,
    SendEmailTool, ToolRegistry,
};
use sdk::errors::EngineError;
use sdk::types::{AgentConfig, AgentType};

const CODER_INSTRUCTIONS: &str =
    "You solve questions using code. Please provide detailed analysis and computation process.";
const CODER_DESCRIPTION: &str =
    "A helpful assistant that writes and executes code to process and analyze data.";

const WEB_SURFER_INSTRUCTIONS: &str = "You are a web researcher. You find information from the internet without additional computation or quantitative analysis.";
const WEB_SURFER_DESCRIPTION: &str = "Specialist in web research and information gathering";

const FILE_SURFER_INSTRUCTIONS: &str =
    "You are a file explorer. You can read files and list directories to help understand data structures.";
const FILE_SURFER_DESCRIPTION: &str = "Specialist in file operations and data exploration";

const CUSTOM_INSTRUCTIONS: &str = "You are a helpful assistant.";
const CUSTOM_DESCRIPTION: &str = "A custom specialized agent";
const CUSTOM_MCP_DESCRIPTION: &str = "A custom MCP agent with communication capabilities";

const RAG_INSTRUCTIONS: &str =
    "You are a knowledge assistant with access to specialized information through search.";
const RAG_DESCRIPTION: &str = "A RAG agent with knowledge base access";

/// Everything the factory needs besides the configurations themselves
#[derive(Clone)]
pub struct AgentContext {
    pub user_id: String,
    pub session_id: String,
    pub tools: ToolsConfig,
    pub client: Arc<dyn LLMProvider>,
    pub llm_timeout: Duration,
}

impl AgentContext {
    /// Scratch directory for this session's code runs
    pub fn session_dir(&self) -> PathBuf {
        self.tools.work_dir.join(&self.session_id)
    }

    /// Directory the FileSurfer may read
    pub fn data_dir(&self) -> PathBuf {
        self.tools.work_dir.join("data")
    }
}

/// Build the participants for a session.
///
/// Unknown built-in names and unknown types are skipped with a warning. Two
/// configurations that produce the same agent name collapse to the later one.
pub fn setup_agents(
    configs: &[AgentConfig],
    ctx: &AgentContext,
) -> Result<Vec<ChatAgent>, EngineError> {
    let mut agents: Vec<ChatAgent> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for config in configs {
        let Some(agent) = build_agent(config, ctx)? else {
            continue;
        };
        let agent = agent.with_llm_timeout(ctx.llm_timeout);

        let key = agent.name.to_lowercase();
        match index.get(&key) {
            Some(&i) => {
                warn!("Duplicate agent name '{}', keeping the later one", agent.name);
                agents[i] = agent;
            }
            None => {
                index.insert(key, agents.len());
                agents.push(agent);
            }
        }
    }

    info!(
        "Configured {} agents for session {}: {}",
        agents.len(),
        ctx.session_id,
        agents
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(agents)
}

fn build_agent(config: &AgentConfig, ctx: &AgentContext) -> Result<Option<ChatAgent>, EngineError> {
    let client = Arc::clone(&ctx.client);

    let agent = match config.agent_type {
        AgentType::MagenticOne => match config.name.as_str() {
            "Coder" => ChatAgent::new("CoderAgent", CODER_DESCRIPTION, CODER_INSTRUCTIONS, client)
                .with_tools(ToolRegistry::empty().with(ExecuteCodeTool::new(
                    ctx.tools.code_interpreter.clone(),
                    ctx.session_dir(),
                    Duration::from_secs(ctx.tools.code_timeout_secs),
                ))),
            "WebSurfer" => ChatAgent::new(
                "WebSurferAgent",
                WEB_SURFER_DESCRIPTION,
                WEB_SURFER_INSTRUCTIONS,
                client,
            )
            .with_tools(ToolRegistry::empty().with(FetchUrlTool::new(ctx.tools.fetch_max_bytes)?)),
            "FileSurfer" => {
                let guard = Arc::new(FileSystemGuard::new(ctx.data_dir())?);
                ChatAgent::new(
                    "FileSurferAgent",
                    FILE_SURFER_DESCRIPTION,
                    FILE_SURFER_INSTRUCTIONS,
                    client,
                )
                .with_tools(
                    ToolRegistry::empty()
                        .with(ReadFileTool::new(Arc::clone(&guard)))
                        .with(ListFilesTool::new(guard)),
                )
            }
            other => {
                warn!("Unknown MagenticOne agent '{}', skipping", other);
                return Ok(None);
            }
        },
        AgentType::Custom => ChatAgent::new(
            agent_name(config),
            or_default(&config.description, CUSTOM_DESCRIPTION),
            or_default(&config.system_message, CUSTOM_INSTRUCTIONS),
            client,
        ),
        AgentType::CustomMcp => {
            let instructions = format!(
                "{}\n\nIn case of email use this address as TO: {}",
                or_default(&config.system_message, CUSTOM_INSTRUCTIONS),
                ctx.user_id
            );
            ChatAgent::new(
                agent_name(config),
                or_default(&config.description, CUSTOM_MCP_DESCRIPTION),
                instructions,
                client,
            )
            .with_tools(ToolRegistry::empty().with(SendEmailTool::new()))
        }
        AgentType::Rag => ChatAgent::new(
            agent_name(config),
            or_default(&config.description, RAG_DESCRIPTION),
            RAG_INSTRUCTIONS,
            client,
        )
        .with_tools(
            ToolRegistry::empty().with(SearchKnowledgeBaseTool::new(ctx.tools.knowledge_dir.clone())),
        ),
        AgentType::Unknown => {
            warn!("Agent '{}' has an unknown type, skipping", config.name);
            return Ok(None);
        }
    };

    Ok(Some(agent))
}

fn agent_name(config: &AgentConfig) -> String {
    format!("{}Agent", config.name)
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}
