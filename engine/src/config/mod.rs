//! Configuration management
//!
//! This module handles loading, validation, and management of the Dream Team
//! configuration. Configuration is stored in TOML format at
//! ~/.dreamteam/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **server**: Bind address, optional bearer token, default user
//! - **llm**: Chat model provider settings (Azure OpenAI or OpenAI)
//! - **orchestrator**: Round, time, stall and reset limits for a run
//! - **tools**: Work directory, knowledge base, code interpreter settings
//!
//! # Path Expansion
//!
//! `~` in `core.data_dir`, `tools.work_dir` and `tools.knowledge_dir` is
//! expanded to the user's home directory, and the directories are created on
//! load.
//!
//! # Examples
//!
//! ```no_run
//! use dreamteam_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Listening on {}:{}", config.server.host, config.server.port);
//! println!("Provider: {}", config.llm.provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `llm.azure.endpoint`
pub const AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Orchestration limits
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Agent tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion); holds the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// When set, authenticated routes require `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Subject used for requests that do not name a user
    #[serde(default = "default_user")]
    pub default_user: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_token: None,
            default_user: default_user(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider used for the manager and every agent (azure, openai)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Azure OpenAI provider settings
    #[serde(default)]
    pub azure: AzureOpenAIConfig,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,
    // Note: API key comes from OPENAI_API_KEY or the OS keychain
}

/// Azure OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAIConfig {
    /// Resource endpoint, e.g. https://my-resource.openai.azure.com
    #[serde(default)]
    pub endpoint: String,

    /// Deployment name
    #[serde(default = "default_model")]
    pub deployment: String,

    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
    // Note: API key comes from AZURE_OPENAI_API_KEY or the OS keychain
}

/// Limits applied to every orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Wall clock budget for one run, in seconds
    #[serde(default = "default_max_time_secs")]
    pub max_time_secs: u64,

    #[serde(default = "default_max_stalls")]
    pub max_stalls_before_replan: u32,

    #[serde(default = "default_max_resets")]
    pub max_reset_count: u32,

    /// Timeout for a single LLM call, in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_time_secs: default_max_time_secs(),
            max_stalls_before_replan: default_max_stalls(),
            max_reset_count: default_max_resets(),
            llm_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn max_time(&self) -> Duration {
        Duration::from_secs(self.max_time_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

/// Agent tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root for per-session scratch space; FileSurfer reads `<work_dir>/data`
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory of .md/.txt documents searched by RAG agents
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,

    /// Interpreter used by the Coder agent
    #[serde(default = "default_code_interpreter")]
    pub code_interpreter: String,

    #[serde(default = "default_code_timeout_secs")]
    pub code_timeout_secs: u64,

    /// Maximum bytes of page text returned by the WebSurfer fetch tool
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            knowledge_dir: default_knowledge_dir(),
            code_interpreter: default_code_interpreter(),
            code_timeout_secs: default_code_timeout_secs(),
            fetch_max_bytes: default_fetch_max_bytes(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.dreamteam")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_user() -> String {
    "user123".to_string()
}

fn default_provider() -> String {
    "azure".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_azure_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_max_rounds() -> u32 {
    20
}

fn default_max_time_secs() -> u64 {
    25 * 60
}

fn default_max_stalls() -> u32 {
    3
}

fn default_max_resets() -> u32 {
    2
}

fn default_llm_timeout_secs() -> u64 {
    300
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("~/.dreamteam/logs")
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("~/.dreamteam/knowledge")
}

fn default_code_interpreter() -> String {
    "python3".to_string()
}

fn default_code_timeout_secs() -> u64 {
    60
}

fn default_fetch_max_bytes() -> usize {
    20_000
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_model(),
        }
    }
}

impl Default for AzureOpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: default_model(),
            api_version: default_azure_api_version(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.dreamteam/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse, apply environment overrides and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        // Validate a copy so the file on disk keeps the portable `~` paths
        let mut config = config;
        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.dreamteam/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".dreamteam").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            server: ServerConfig::default(),
            llm: LLMConfig {
                provider: default_provider(),
                openai: OpenAIConfig::default(),
                azure: AzureOpenAIConfig::default(),
            },
            orchestrator: OrchestratorConfig::default(),
            tools: ToolsConfig::default(),
        }
    }

    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("dreamteam.db")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(AZURE_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.llm.azure.endpoint = endpoint.trim().to_string();
            }
        }
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates log level, provider and limits
    /// - Expands ~ in paths
    /// - Creates data, work and knowledge directories
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["azure", "openai"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: {}",
                self.llm.provider,
                valid_providers.join(", ")
            )));
        }

        if self.orchestrator.max_rounds == 0 {
            return Err(EngineError::Config(
                "orchestrator.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.max_time_secs == 0 || self.orchestrator.llm_timeout_secs == 0 {
            return Err(EngineError::Config(
                "orchestrator time limits must be greater than zero".to_string(),
            ));
        }

        if let Some(token) = &self.server.auth_token {
            if token.trim().is_empty() {
                self.server.auth_token = None;
            }
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.tools.work_dir = expand_path(&self.tools.work_dir)?;
        self.tools.knowledge_dir = expand_path(&self.tools.knowledge_dir)?;

        for dir in [
            &self.core.data_dir,
            &self.tools.work_dir,
            &self.tools.knowledge_dir,
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    EngineError::Config(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
