//! The closed set of tool names and the registry that binds them to implementations

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::BoxedTool;

/// Every tool a model may invoke.
///
/// The set is fixed; an invocation naming anything else is answered with
/// an unknown-tool error rather than looked up dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ExecuteCommand,
    ReadFile,
    WriteToFile,
    ReplaceInFile,
    ListFiles,
    SearchFiles,
    ListCodeDefinitionNames,
    BrowserAction,
    UseMcpTool,
    AccessMcpResource,
    AskFollowupQuestion,
    PlanModeRespond,
    LoadMcpDocumentation,
    AttemptCompletion,
    NewTask,
    Condense,
    ReportBug,
    NewRule,
}

/// Capability categories used by the confirmation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Execute,
    Edit,
    Read,
    Browser,
    Mcp,
    Meta,
    PlanResponse,
    Completion,
}

impl ToolName {
    pub const ALL: [ToolName; 18] = [
        ToolName::ExecuteCommand,
        ToolName::ReadFile,
        ToolName::WriteToFile,
        ToolName::ReplaceInFile,
        ToolName::ListFiles,
        ToolName::SearchFiles,
        ToolName::ListCodeDefinitionNames,
        ToolName::BrowserAction,
        ToolName::UseMcpTool,
        ToolName::AccessMcpResource,
        ToolName::AskFollowupQuestion,
        ToolName::PlanModeRespond,
        ToolName::LoadMcpDocumentation,
        ToolName::AttemptCompletion,
        ToolName::NewTask,
        ToolName::Condense,
        ToolName::ReportBug,
        ToolName::NewRule,
    ];

    /// The name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ExecuteCommand => "execute_command",
            ToolName::ReadFile => "read_file",
            ToolName::WriteToFile => "write_to_file",
            ToolName::ReplaceInFile => "replace_in_file",
            ToolName::ListFiles => "list_files",
            ToolName::SearchFiles => "search_files",
            ToolName::ListCodeDefinitionNames => "list_code_definition_names",
            ToolName::BrowserAction => "browser_action",
            ToolName::UseMcpTool => "use_mcp_tool",
            ToolName::AccessMcpResource => "access_mcp_resource",
            ToolName::AskFollowupQuestion => "ask_followup_question",
            ToolName::PlanModeRespond => "plan_mode_respond",
            ToolName::LoadMcpDocumentation => "load_mcp_documentation",
            ToolName::AttemptCompletion => "attempt_completion",
            ToolName::NewTask => "new_task",
            ToolName::Condense => "condense",
            ToolName::ReportBug => "report_bug",
            ToolName::NewRule => "new_rule",
        }
    }

    /// Resolve a wire name, accepting the short aliases some prompts use
    pub fn from_wire(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(tool) = Self::ALL.iter().find(|t| t.as_str() == name) {
            return Some(*tool);
        }
        match name {
            "write_file" => Some(ToolName::WriteToFile),
            "patch_file" => Some(ToolName::ReplaceInFile),
            "list_code_definitions" => Some(ToolName::ListCodeDefinitionNames),
            _ => None,
        }
    }

    pub fn category(&self) -> ToolCategory {
        match self {
            ToolName::ExecuteCommand => ToolCategory::Execute,
            ToolName::WriteToFile | ToolName::ReplaceInFile | ToolName::NewRule => {
                ToolCategory::Edit
            }
            ToolName::ReadFile
            | ToolName::ListFiles
            | ToolName::SearchFiles
            | ToolName::ListCodeDefinitionNames => ToolCategory::Read,
            ToolName::BrowserAction => ToolCategory::Browser,
            ToolName::UseMcpTool | ToolName::AccessMcpResource => ToolCategory::Mcp,
            ToolName::NewTask
            | ToolName::Condense
            | ToolName::ReportBug
            | ToolName::AskFollowupQuestion
            | ToolName::LoadMcpDocumentation => ToolCategory::Meta,
            ToolName::PlanModeRespond => ToolCategory::PlanResponse,
            ToolName::AttemptCompletion => ToolCategory::Completion,
        }
    }

    /// Tools whose failures feed the per-file diff tracker
    pub fn is_file_mutation(&self) -> bool {
        matches!(self, ToolName::ReplaceInFile | ToolName::WriteToFile)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolNotFound;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| ToolNotFound(s.to_string()))
    }
}

/// Raised when an invocation names a tool that is not available
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error: Unknown tool '{0}'. Use one of the available tools.")]
pub struct ToolNotFound(pub String);

/// Maps tool names to their implementations
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, returning any tool it replaced
    pub fn register(&mut self, tool: BoxedTool) -> Option<BoxedTool> {
        self.tools.insert(tool.name(), tool)
    }

    /// Look a tool up by wire name (or alias)
    pub fn resolve(&self, name: &str) -> Result<&BoxedTool, ToolNotFound> {
        ToolName::from_wire(name)
            .and_then(|tool| self.tools.get(&tool))
            .ok_or_else(|| ToolNotFound(name.to_string()))
    }

    pub fn get(&self, name: ToolName) -> Option<&BoxedTool> {
        self.tools.get(&name)
    }

    /// All registered tools in a stable order
    pub fn all(&self) -> impl Iterator<Item = &BoxedTool> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolContext, ToolParams, ToolResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FakeRead;

    #[async_trait]
    impl Tool for FakeRead {
        fn name(&self) -> ToolName {
            ToolName::ReadFile
        }
        fn description(&self) -> &str {
            "Reads"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            crate::tool::string_params_schema(&[("path", "File to read", true)])
        }
        async fn execute(&self, _params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
            Ok("contents".into())
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_wire(tool.as_str()), Some(tool));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(ToolName::from_wire("write_file"), Some(ToolName::WriteToFile));
        assert_eq!(ToolName::from_wire("patch_file"), Some(ToolName::ReplaceInFile));
        assert_eq!(
            ToolName::from_wire("list_code_definitions"),
            Some(ToolName::ListCodeDefinitionNames)
        );
        assert_eq!(ToolName::from_wire("rm_rf"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ToolName::ExecuteCommand.category(), ToolCategory::Execute);
        assert_eq!(ToolName::NewRule.category(), ToolCategory::Edit);
        assert_eq!(ToolName::SearchFiles.category(), ToolCategory::Read);
        assert_eq!(ToolName::AccessMcpResource.category(), ToolCategory::Mcp);
        assert_eq!(ToolName::ReportBug.category(), ToolCategory::Meta);
        assert_eq!(ToolName::PlanModeRespond.category(), ToolCategory::PlanResponse);
    }

    #[test]
    fn test_resolve() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(FakeRead)).is_none());
        assert_eq!(registry.len(), 1);

        assert!(registry.resolve("read_file").is_ok());

        let err = registry.resolve("write_to_file").err().unwrap();
        assert_eq!(err, ToolNotFound("write_to_file".into()));

        let err = registry.resolve("unknown_tool_xyz").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Error: Unknown tool 'unknown_tool_xyz'. Use one of the available tools."
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeRead));
        assert!(registry.register(Arc::new(FakeRead)).is_some());
        assert_eq!(registry.names(), vec![ToolName::ReadFile]);
    }
}
