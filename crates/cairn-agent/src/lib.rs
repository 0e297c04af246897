//! cairn-agent: the conversation loop of a coding agent
//!
//! This crate parses assistant replies into tool calls, gates them behind
//! an approval policy, runs them, and feeds results back to the model until
//! the task completes.

pub mod agent;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handle;
pub mod markup;
pub mod memory;
pub mod parser;
pub mod registry;
pub mod session;
pub mod tool;
pub mod transport;

pub use agent::{Agent, AgentConfig};
pub use confirm::{ConfirmationRequest, Confirmer, PolicyFlags, StaticConfirmer};
pub use dispatch::{Dispatched, Dispatcher, Outcome};
pub use error::Error;
pub use events::{AgentEvent, StopReason};
pub use handle::AgentHandle;
pub use memory::{Memory, MemoryConfig};
pub use parser::Segment;
pub use registry::{ToolCategory, ToolName, ToolRegistry};
pub use session::{Mode, Session};
pub use tool::{BoxedTool, Tool, ToolCall, ToolContext, ToolError, ToolParams, ToolResult};
pub use transport::{ProviderTransport, ScriptedTransport, Transport};
