//! The conversation driver: one LLM call, at most one tool call, repeat

use std::sync::Arc;

use cairn_ai::{Message, Reply, Role};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    dispatch::Dispatcher,
    events::{AgentEvent, StopReason},
    handle::AgentHandle,
    memory::MemoryConfig,
    parser::{self, Segment},
    registry::ToolName,
    session::{Mode, Session},
    transport::Transport,
};

/// Consecutive errors that trigger an admonishment before the next call
pub const ADMONISHMENT_THRESHOLD: u32 = 3;

/// Injected as a system message after repeated tool or format errors
pub const ADMONISHMENT: &str = "System: You have made several consecutive errors in tool usage or formatting. Please carefully review the available tools, their required parameters, and the expected XML format. Ensure your next response is a valid tool call or a text response.";

/// Returned (and recorded) when the backend produces nothing
pub const NO_RESPONSE: &str = "LLM did not provide a response. Ending task.";

pub const MAX_STEPS_REACHED: &str = "Max steps reached without completion.";

pub const TASK_CANCELLED: &str = "Task cancelled.";

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System prompt; becomes the first message of the history
    pub system_prompt: String,
    /// Step budget used by [`Agent::run`]
    pub max_steps: usize,
    pub memory: MemoryConfig,
    pub mode: Mode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_steps: 20,
            memory: MemoryConfig::default(),
            mode: Mode::Act,
        }
    }
}

/// Drives a conversation between the model and the tools.
///
/// An agent owns its session state exclusively; run one task at a time.
pub struct Agent {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    session: Session,
    event_tx: broadcast::Sender<AgentEvent>,
    handle: AgentHandle,
}

impl Agent {
    /// Create a new agent
    pub fn new(config: AgentConfig, transport: Arc<dyn Transport>, dispatcher: Dispatcher) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let mut session = Session::new(config.system_prompt.clone(), config.memory);
        session.mode = config.mode;
        Self {
            config,
            transport,
            dispatcher,
            session,
            event_tx,
            handle: AgentHandle::new(),
        }
    }

    /// Subscribe to agent events
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for cancelling from other tasks.
    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A copy of the conversation history
    pub fn history(&self) -> Vec<Message> {
        self.session.memory.history()
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        tracing::info!("Switching to {} mode", mode);
        self.session.mode = mode;
    }

    /// Send future LLM calls through `transport`; the history is kept
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    pub fn consecutive_tool_errors(&self) -> u32 {
        self.session.consecutive_tool_errors()
    }

    /// Dollars spent on LLM calls this session
    pub fn session_cost(&self) -> f64 {
        self.session.cost
    }

    /// Run a task with the configured step budget
    pub async fn run(&mut self, input: &str) -> String {
        self.run_task(input, self.config.max_steps).await
    }

    /// Run one task to completion and return its final text.
    ///
    /// The loop ends when the model calls `attempt_completion`, answers
    /// with text and no tool call, stops responding, is cancelled, or runs
    /// out of steps. Only the first tool call of each reply is executed.
    pub async fn run_task(&mut self, input: &str, max_steps: usize) -> String {
        let cancel = self.handle.begin();
        tracing::info!("Task started (max {} steps)", max_steps);
        let _ = self.event_tx.send(AgentEvent::TaskStart {
            input: input.to_string(),
        });

        self.append(Role::User, input);
        let (result, reason) = self.drive(max_steps, &cancel).await;

        self.handle.finish();
        tracing::info!("Task ended: {:?}", reason);
        let _ = self.event_tx.send(AgentEvent::TaskEnd {
            result: result.clone(),
            reason,
        });
        result
    }

    async fn drive(&mut self, max_steps: usize, cancel: &CancellationToken) -> (String, StopReason) {
        for step in 1..=max_steps {
            if cancel.is_cancelled() {
                return (TASK_CANCELLED.to_string(), StopReason::Cancelled);
            }
            tracing::debug!("Step {}/{}", step, max_steps);
            let _ = self.event_tx.send(AgentEvent::StepStart { step, max_steps });

            let errors = self.session.errors.consecutive();
            if errors >= ADMONISHMENT_THRESHOLD {
                tracing::warn!("{} consecutive tool errors, admonishing the model", errors);
                self.append(Role::System, ADMONISHMENT);
                self.session.errors.reset();
                let _ = self.event_tx.send(AgentEvent::Admonished {
                    consecutive_errors: errors,
                });
            }

            let reply = match self.transport.send(self.session.memory.messages()).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("LLM request failed: {}", e);
                    Reply::empty()
                }
            };
            let Some(content) = reply.content else {
                self.append(Role::System, NO_RESPONSE);
                return (NO_RESPONSE.to_string(), StopReason::NoResponse);
            };

            if let Some(usage) = reply.usage {
                self.session.cost += usage.cost;
                let _ = self.event_tx.send(AgentEvent::Usage {
                    usage,
                    session_cost: self.session.cost,
                });
            }

            self.append(Role::Assistant, content.as_str());
            let _ = self.event_tx.send(AgentEvent::AssistantReply {
                content: content.clone(),
            });

            let segments = parser::parse(&content);
            let malformed = segments.iter().any(Segment::is_malformed_tool_use);
            if malformed {
                tracing::warn!("Reply contained a malformed tool use");
                self.session.errors.record_error();
            }

            let text = segments
                .iter()
                .filter_map(Segment::as_text)
                .collect::<Vec<_>>()
                .join("\n");

            let Some(call) = segments.iter().find_map(Segment::as_tool) else {
                if !malformed {
                    self.session.errors.reset();
                }
                return (text, StopReason::TextReply);
            };

            if call.tool() == Some(ToolName::AttemptCompletion) {
                let result = call.params.get("result").unwrap_or_default();
                let output = match (text.is_empty(), result.is_empty()) {
                    (true, _) => result.to_string(),
                    (false, true) => text,
                    (false, false) => format!("{}\n{}", text, result),
                };
                return (output, StopReason::Completed);
            }

            let _ = self.event_tx.send(AgentEvent::ToolExecutionStart {
                tool_name: call.name.clone(),
                params: call.params.clone(),
            });
            let dispatched = self.dispatcher.dispatch(call, &mut self.session).await;
            let _ = self.event_tx.send(AgentEvent::ToolExecutionEnd {
                tool_name: call.name.clone(),
                result: dispatched.output.clone(),
                outcome: dispatched.outcome,
            });

            self.append(
                Role::User,
                format!("Result of {}:\n{}", call.name, dispatched.output),
            );
        }

        (MAX_STEPS_REACHED.to_string(), StopReason::MaxSteps)
    }

    fn append(&mut self, role: Role, content: impl Into<String>) {
        if self.session.memory.append(role, content) {
            let _ = self.event_tx.send(AgentEvent::Summarized {
                history_len: self.session.memory.len(),
            });
        }
    }
}
