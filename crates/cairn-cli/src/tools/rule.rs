//! Rule file creation tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;

use super::write::write_file;

/// Tool for saving a project rule (a Markdown file of standing instructions)
pub struct RuleTool;

#[async_trait]
impl Tool for RuleTool {
    fn name(&self) -> ToolName {
        ToolName::NewRule
    }

    fn description(&self) -> &str {
        "Create a rule file with standing instructions for this project, e.g. .clinerules/testing.md. Rules are Markdown."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("path", "Path of the rule file, relative to the project root", true),
            ("content", "Markdown content of the rule", true),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params
            .get_non_empty("path")
            .ok_or_else(|| ToolError::InvalidValue("missing 'path'".into()))?;
        let content = params
            .get_non_empty("content")
            .ok_or_else(|| ToolError::InvalidValue("missing 'content'".into()))?;

        write_file(&ctx.resolve_path(path_str), content).await?;
        Ok(format!("Created rule file {}", path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    #[tokio::test]
    async fn test_writes_rule() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", ".clinerules/style.md"), ("content", "# Style\nUse tabs.")]
            .into_iter()
            .collect();
        let output = RuleTool.execute(&params, &ctx).await.unwrap();

        assert_eq!(output, "Created rule file .clinerules/style.md");
        let written = std::fs::read_to_string(dir.path().join(".clinerules/style.md")).unwrap();
        assert_eq!(written, "# Style\nUse tabs.");
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "rule.md"), ("content", " ")].into_iter().collect();
        assert!(RuleTool.execute(&params, &ctx).await.is_err());
    }
}
