//! File writing tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use std::path::Path;
use tokio::fs;

/// Tool for writing whole files
pub struct WriteTool;

impl WriteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> ToolName {
        ToolName::WriteToFile
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does. Automatically creates parent directories. Always provide the complete file content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("path", "Path of the file to write (relative to the working directory)", true),
            ("content", "The complete content to write to the file", true),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params
            .get_non_empty("path")
            .ok_or_else(|| ToolError::InvalidValue("missing 'path'".into()))?;
        let content = params
            .get("content")
            .ok_or_else(|| ToolError::InvalidValue("missing 'content'".into()))?;

        write_file(&ctx.resolve_path(path_str), content).await?;
        Ok(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            path_str
        ))
    }
}

/// Write `content` to `path`, creating parent directories first
pub(crate) async fn write_file(path: &Path, content: &str) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::Failed(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    fs::write(path, content)
        .await
        .map_err(|e| ToolError::Failed(format!("Failed to write file {}: {}", path.display(), e)))
}
