//! Tools that only talk about the conversation itself

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolParams, ToolResult, param_docs, string_params_schema};
use cairn_agent::ToolName;

const MCP_DOCUMENTATION: &str = "\
# Creating an MCP server

The Model Context Protocol (MCP) lets a local server expose tools and resources
to the agent over JSON-RPC on stdio.

1. Pick an SDK (TypeScript, Python or Rust) and create a new project.
2. Declare each tool with a name, a description and a JSON Schema for its input.
3. Declare resources with a URI template and a MIME type.
4. Handle `tools/call` and `resources/read` requests and return their content.
5. Register the server in the client's MCP settings with the command that starts it.

Once connected, call its tools with use_mcp_tool and read its resources with
access_mcp_resource.";

/// A tool whose result acknowledges the call and echoes its parameters
pub struct MetaTool {
    name: ToolName,
    description: &'static str,
    params: &'static [(&'static str, &'static str, bool)],
}

impl MetaTool {
    pub fn new_task() -> Self {
        Self {
            name: ToolName::NewTask,
            description: "Start a new task preloaded with context: the current work, key technical concepts, relevant files, problem solving so far, and pending next steps.",
            params: &[("context", "Detailed summary of the conversation and work so far", true)],
        }
    }

    pub fn condense() -> Self {
        Self {
            name: ToolName::Condense,
            description: "Replace the conversation so far with a detailed summary to free up context.",
            params: &[("context", "Detailed summary of the conversation to keep", true)],
        }
    }

    pub fn report_bug() -> Self {
        Self {
            name: ToolName::ReportBug,
            description: "Collect the details of a bug report for the user to submit.",
            params: &[
                ("title", "Concise description of the issue", true),
                ("what_happened", "What happened and what was expected", true),
                ("steps_to_reproduce", "Steps to reproduce the bug", true),
                ("api_request_output", "Relevant API request output, if any", false),
                ("additional_context", "Other details or relevant context", false),
            ],
        }
    }

    pub fn plan_mode_respond() -> Self {
        Self {
            name: ToolName::PlanModeRespond,
            description: "Respond to the user while in PLAN MODE: share the plan or ask clarifying questions before acting. Only available in PLAN MODE.",
            params: &[("response", "The response to show the user", true)],
        }
    }

    pub fn load_mcp_documentation() -> Self {
        Self {
            name: ToolName::LoadMcpDocumentation,
            description: "Load documentation about creating MCP servers.",
            params: &[],
        }
    }

    pub fn attempt_completion() -> Self {
        Self {
            name: ToolName::AttemptCompletion,
            description: "Present the final result of your work to the user. Use this once the task is complete; it ends the task.",
            params: &[
                ("result", "The result of the task, stated as final", true),
                ("command", "A command that demonstrates the result, if any", false),
            ],
        }
    }

    /// All conversation-level tools
    pub fn all() -> Vec<Self> {
        vec![
            Self::new_task(),
            Self::condense(),
            Self::report_bug(),
            Self::plan_mode_respond(),
            Self::load_mcp_documentation(),
            Self::attempt_completion(),
        ]
    }
}

#[async_trait]
impl Tool for MetaTool {
    fn name(&self) -> ToolName {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(self.params)
    }

    async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
        if self.name == ToolName::LoadMcpDocumentation {
            return Ok(MCP_DOCUMENTATION.to_string());
        }

        let mut lines = vec![format!("{} acknowledged.", self.name)];
        for doc in param_docs(&self.parameters_schema()) {
            if let Some(value) = params.get_non_empty(&doc.name) {
                lines.push(format!("{}: {}", doc.name, value));
            }
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), PolicyFlags::default())
    }

    #[tokio::test]
    async fn test_acknowledges_parameters() {
        let params: ToolParams = [("context", "halfway through the refactor"), ("extra", "ignored")]
            .into_iter()
            .collect();
        let output = MetaTool::new_task().execute(&params, &ctx()).await.unwrap();
        assert_eq!(output, "new_task acknowledged.\ncontext: halfway through the refactor");
    }

    #[tokio::test]
    async fn test_mcp_documentation() {
        let output = MetaTool::load_mcp_documentation()
            .execute(&ToolParams::new(), &ctx())
            .await
            .unwrap();
        assert!(output.starts_with("# Creating an MCP server"));
    }

    #[test]
    fn test_all_names_distinct() {
        let mut names: Vec<_> = MetaTool::all().iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
