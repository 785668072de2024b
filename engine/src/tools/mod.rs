//! Tools that participant agents can call
//!
//! Each agent gets its own [`ToolRegistry`] built by the agent factory. The
//! registry advertises its tools in the agent's system prompt and dispatches
//! calls parsed from model output. Failures come back as `"ERROR: ..."`
//! strings so the model can read them and try again.

pub mod code;
pub mod email;
pub mod filesystem;
pub mod knowledge;
pub mod web;

pub use code::ExecuteCodeTool;
pub use email::SendEmailTool;
pub use filesystem::{ListFilesTool, ReadFileTool};
pub use knowledge::SearchKnowledgeBaseTool;
pub use web::FetchUrlTool;

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `{"function": ...}`
    fn name(&self) -> &'static str;

    /// One line shown to the model
    fn description(&self) -> &'static str;

    /// Example arguments object shown to the model
    fn arguments_hint(&self) -> &'static str;

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError>;
}

/// The set of tools one agent may use
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Dispatch a tool call by name, parsing arguments from JSON.
    ///
    /// Never fails: errors are rendered into the returned text.
    pub async fn dispatch(&self, name: &str, arguments_json: &str) -> String {
        debug!("Dispatching tool '{}' with args: {}", name, arguments_json);

        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!("Unknown tool requested: {}", name);
            return format!(
                "ERROR: {}. Available tools: {}",
                EngineError::ToolNotFound(name.to_string()),
                self.names().join(", ")
            );
        };

        let args: serde_json::Value = if arguments_json.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(arguments_json) {
                Ok(v) => v,
                Err(e) => return format!("ERROR: Failed to parse arguments JSON: {}", e),
            }
        };

        match tool.call(&args).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool '{}' failed: {}", name, e);
                format!("ERROR: {}", e)
            }
        }
    }

    /// Tool section appended to an agent's instructions. Empty when the
    /// agent has no tools.
    pub fn system_prompt(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }

        let mut parts = vec![
            "TOOLS".to_string(),
            "To call a tool, reply with ONLY this JSON object and nothing else:".to_string(),
            r#"{"function": "tool_name", "arguments": {"arg": "value"}}"#.to_string(),
            "After you receive the tool result, either call another tool or reply in plain text with your answer.".to_string(),
            "Never invent tool output.".to_string(),
        ];

        for tool in &self.tools {
            parts.push(String::new());
            parts.push(format!("## {}", tool.name()));
            parts.push(tool.description().to_string());
            parts.push(format!("Arguments: {}", tool.arguments_hint()));
        }

        parts.join("\n")
    }
}

/// Required string argument
pub(crate) fn str_arg<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, EngineError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EngineError::ToolError(format!("missing required argument '{}'", key)))
}

/// Cut `text` to at most `max` bytes on a char boundary, noting the cut
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[truncated {} bytes]", &text[..end], text.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Repeat the text"
        }
        fn arguments_hint(&self) -> &'static str {
            r#"{"text": "hello"}"#
        }
        async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
            Ok(str_arg(args, "text")?.to_string())
        }
    }

    #[tokio::test]
    async fn test_dispatch_known_tool() {
        let registry = ToolRegistry::empty().with(Echo);
        assert_eq!(registry.dispatch("echo", r#"{"text": "hi"}"#).await, "hi");
    }

    #[tokio::test]
    async fn test_dispatch_errors_are_text() {
        let registry = ToolRegistry::empty().with(Echo);

        let unknown = registry.dispatch("rm", "{}").await;
        assert!(unknown.starts_with("ERROR: Tool not found: rm"));
        assert!(unknown.contains("echo"));

        let bad_json = registry.dispatch("echo", "{not json").await;
        assert!(bad_json.starts_with("ERROR: Failed to parse arguments JSON"));

        let missing = registry.dispatch("echo", "").await;
        assert!(missing.contains("missing required argument 'text'"));
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        assert!(ToolRegistry::empty().system_prompt().is_empty());
        let prompt = ToolRegistry::empty().with(Echo).system_prompt();
        assert!(prompt.contains("## echo"));
        assert!(prompt.contains(r#"{"text": "hello"}"#));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "héllo wörld";
        let cut = truncate(text, 2);
        assert!(cut.starts_with('h'));
        assert!(cut.contains("[truncated"));
        assert_eq!(truncate("short", 100), "short");
    }
}
