//! Agent event types

use cairn_ai::Usage;
use serde::{Deserialize, Serialize};

use crate::dispatch::Outcome;
use crate::tool::ToolParams;

/// Why a task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model called `attempt_completion`
    Completed,
    /// The model answered with text and no tool call
    TextReply,
    /// The backend produced no response
    NoResponse,
    MaxSteps,
    Cancelled,
}

/// Events emitted while a task runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A task started
    TaskStart { input: String },

    /// A new step (one LLM call) started
    StepStart { step: usize, max_steps: usize },

    /// The model replied
    AssistantReply { content: String },

    /// Tool execution started
    ToolExecutionStart { tool_name: String, params: ToolParams },

    /// Tool execution finished (or was refused)
    ToolExecutionEnd {
        tool_name: String,
        result: String,
        outcome: Outcome,
    },

    /// A corrective system message was injected after repeated errors
    Admonished { consecutive_errors: u32 },

    /// Token usage for the last LLM call
    Usage { usage: Usage, session_cost: f64 },

    /// Older history was collapsed into a summary
    Summarized { history_len: usize },

    /// The task ended
    TaskEnd { result: String, reason: StopReason },
}

impl AgentEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::TaskEnd { .. })
    }
}
