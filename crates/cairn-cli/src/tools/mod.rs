//! Built-in tools for the coding agent

mod bash;
mod browser;
mod code_defs;
mod edit;
mod followup;
mod grep;
mod list;
mod mcp;
mod meta;
mod read;
mod rule;
mod write;

use std::sync::Arc;

use cairn_agent::ToolRegistry;

pub use bash::BashTool;
pub use browser::BrowserTool;
pub use code_defs::CodeDefsTool;
pub use edit::EditTool;
pub use followup::FollowupTool;
pub use grep::GrepTool;
pub use list::ListTool;
pub use mcp::{AccessMcpResourceTool, UseMcpTool};
pub use meta::MetaTool;
pub use read::ReadTool;
pub use rule::RuleTool;
pub use write::WriteTool;

/// A registry holding every built-in tool
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(BashTool::new()));
    registry.register(Arc::new(ReadTool::new()));
    registry.register(Arc::new(WriteTool::new()));
    registry.register(Arc::new(EditTool::new()));
    registry.register(Arc::new(ListTool::new()));
    registry.register(Arc::new(GrepTool::new()));
    registry.register(Arc::new(CodeDefsTool::new()));
    registry.register(Arc::new(BrowserTool::new()));
    registry.register(Arc::new(UseMcpTool));
    registry.register(Arc::new(AccessMcpResourceTool));
    registry.register(Arc::new(FollowupTool));
    registry.register(Arc::new(RuleTool));
    for tool in MetaTool::all() {
        registry.register(Arc::new(tool));
    }
    registry
}
