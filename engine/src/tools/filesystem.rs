//! File reading tools for the FileSurfer agent
//!
//! Both tools resolve paths through [`FileSystemGuard`], rooted at the
//! session data directory.

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use super::{str_arg, truncate, Tool};
use crate::fs_guard::FileSystemGuard;

/// Largest file body handed back to the model
const MAX_READ_BYTES: usize = 256 * 1024;

pub struct ReadFileTool {
    guard: Arc<FileSystemGuard>,
}

impl ReadFileTool {
    pub fn new(guard: Arc<FileSystemGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a text file from the data directory."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"file_path": "relative/path.txt"}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let path = self.guard.resolve(str_arg(args, "file_path")?)?;
        info!("Reading file: {}", path.display());

        if path.is_dir() {
            return Err(EngineError::ToolError(format!(
                "{} is a directory; use list_files",
                path.display()
            )));
        }

        let bytes = fs::read(&path).await?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(truncate(&String::from_utf8_lossy(&bytes), MAX_READ_BYTES))
    }
}

pub struct ListFilesTool {
    guard: Arc<FileSystemGuard>,
}

impl ListFilesTool {
    pub fn new(guard: Arc<FileSystemGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files and folders in a directory of the data directory. Defaults to its root."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"directory": "."}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let requested = args
            .get("directory")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let path = self.guard.resolve(requested)?;
        info!("Listing directory: {}", path.display());

        let mut entries = fs::read_dir(&path).await?;
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                dirs.push(format!("{}/", name));
            } else {
                let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                files.push(format!("{} ({})", name, format_size(size)));
            }
        }

        if dirs.is_empty() && files.is_empty() {
            return Ok(format!("Directory {} is empty", requested));
        }

        dirs.sort();
        files.sort();
        let mut out = vec![format!("Files in {}:", requested)];
        out.extend(dirs);
        out.extend(files);
        Ok(out.join("\n"))
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
