//! File reading tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use tokio::fs;

/// Tool for reading file contents
pub struct ReadTool;

impl ReadTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> ToolName {
        ToolName::ReadFile
    }

    fn description(&self) -> &str {
        "Read the full contents of a text file. Use this to examine files whose contents you do not already know."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[(
            "path",
            "Path of the file to read (relative to the working directory)",
            true,
        )])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params
            .get_non_empty("path")
            .ok_or_else(|| ToolError::InvalidValue("missing 'path'".into()))?;
        let path = ctx.resolve_path(path_str);

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) => Err(ToolError::Failed(format!(
                "Failed to read file {}: {}",
                path_str, e
            ))),
        }
    }
}
