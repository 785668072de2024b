//! Code interpreter tool for the Coder agent

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::{str_arg, truncate, Tool};

/// Cap on each of stdout and stderr
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Runs a snippet with the configured interpreter inside the session work
/// directory. The child is killed when the timeout expires.
pub struct ExecuteCodeTool {
    interpreter: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ExecuteCodeTool {
    pub fn new(interpreter: impl Into<String>, work_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            work_dir,
            timeout,
        }
    }

    fn extension(&self) -> &'static str {
        let program = self
            .interpreter
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.interpreter);
        if program.starts_with("python") {
            "py"
        } else if program.starts_with("node") {
            "js"
        } else if matches!(program, "sh" | "bash" | "zsh") {
            "sh"
        } else {
            "txt"
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &'static str {
        "execute_code"
    }

    fn description(&self) -> &'static str {
        "Run a program and return its exit code, stdout and stderr. Print the values you need; files written to the working directory persist for the session."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"code": "print(2 + 2)"}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let code = str_arg(args, "code")?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let script = self
            .work_dir
            .join(format!("snippet_{}.{}", uuid::Uuid::new_v4().simple(), self.extension()));
        tokio::fs::write(&script, code).await?;

        info!(
            "Executing {} byte snippet with {} in {}",
            code.len(),
            self.interpreter,
            self.work_dir.display()
        );

        let child = Command::new(&self.interpreter)
            .arg(&script)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::ToolError(format!("Failed to start {}: {}", self.interpreter, e))
            })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let _ = tokio::fs::remove_file(&script).await;

        let output = match result {
            Ok(output) => output?,
            Err(_) => {
                warn!("Snippet timed out after {}s", self.timeout.as_secs());
                return Err(EngineError::ToolError(format!(
                    "Execution timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "killed".to_string());

        Ok(format!(
            "exit code: {}\nstdout:\n{}\nstderr:\n{}",
            exit,
            truncate(stdout.trim_end(), MAX_OUTPUT_BYTES),
            truncate(stderr.trim_end(), MAX_OUTPUT_BYTES)
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_runs_snippet_in_work_dir() {
        let temp = TempDir::new().unwrap();
        let tool = ExecuteCodeTool::new("sh", temp.path().to_path_buf(), Duration::from_secs(10));

        let out = tool
            .call(&json!({"code": "echo computed > result.txt; echo 42; echo warn >&2"}))
            .await
            .unwrap();
        assert!(out.starts_with("exit code: 0"));
        assert!(out.contains("stdout:\n42"));
        assert!(out.contains("stderr:\nwarn"));
        assert!(temp.path().join("result.txt").exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let tool = ExecuteCodeTool::new("sh", temp.path().to_path_buf(), Duration::from_secs(10));
        let out = tool.call(&json!({"code": "exit 3"})).await.unwrap();
        assert!(out.starts_with("exit code: 3"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = TempDir::new().unwrap();
        let tool =
            ExecuteCodeTool::new("sh", temp.path().to_path_buf(), Duration::from_millis(200));
        let err = tool.call(&json!({"code": "sleep 5"})).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let temp = TempDir::new().unwrap();
        let tool = ExecuteCodeTool::new(
            "definitely-not-an-interpreter",
            temp.path().to_path_buf(),
            Duration::from_secs(1),
        );
        assert!(tool.call(&json!({"code": "1"})).await.is_err());
    }

    #[test]
    fn test_extension() {
        let dir = PathBuf::from("/tmp");
        let ext = |i: &str| ExecuteCodeTool::new(i, dir.clone(), Duration::from_secs(1)).extension();
        assert_eq!(ext("python3"), "py");
        assert_eq!(ext("/usr/bin/python3.12"), "py");
        assert_eq!(ext("node"), "js");
        assert_eq!(ext("bash"), "sh");
    }
}
