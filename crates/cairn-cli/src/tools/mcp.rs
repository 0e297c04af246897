//! MCP tool and resource access
//!
//! No MCP servers are connected in this build, so both tools check their
//! parameters and then report the missing server.

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;

fn no_server(server: &str) -> ToolError {
    ToolError::Failed(format!(
        "No MCP server named '{}' is connected. No MCP servers are available in this session.",
        server
    ))
}

fn required<'a>(params: &'a ToolParams, key: &str) -> Result<&'a str, ToolError> {
    params
        .get_non_empty(key)
        .map(str::trim)
        .ok_or_else(|| ToolError::InvalidValue(format!("missing '{}'", key)))
}

/// Calls a tool on a connected MCP server
pub struct UseMcpTool;

#[async_trait]
impl Tool for UseMcpTool {
    fn name(&self) -> ToolName {
        ToolName::UseMcpTool
    }

    fn description(&self) -> &str {
        "Use a tool provided by a connected MCP server, giving the server name, the tool name and its arguments as a JSON object."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("server_name", "Name of the MCP server providing the tool", true),
            ("tool_name", "Name of the tool to execute", true),
            ("arguments", "JSON object with the tool's input parameters", true),
        ])
    }

    async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
        let server = required(params, "server_name")?;
        required(params, "tool_name")?;
        let arguments = params.get("arguments").unwrap_or("{}");
        let parsed: serde_json::Value = serde_json::from_str(arguments)
            .map_err(|e| ToolError::InvalidValue(format!("'arguments' is not valid JSON: {}", e)))?;
        if !parsed.is_object() {
            return Err(ToolError::InvalidValue("'arguments' must be a JSON object".into()));
        }
        Err(no_server(server))
    }
}

/// Reads a resource from a connected MCP server
pub struct AccessMcpResourceTool;

#[async_trait]
impl Tool for AccessMcpResourceTool {
    fn name(&self) -> ToolName {
        ToolName::AccessMcpResource
    }

    fn description(&self) -> &str {
        "Access a resource provided by a connected MCP server, identified by the server name and the resource URI."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("server_name", "Name of the MCP server providing the resource", true),
            ("uri", "URI of the resource to access", true),
        ])
    }

    async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
        let server = required(params, "server_name")?;
        required(params, "uri")?;
        Err(no_server(server))
    }
}
