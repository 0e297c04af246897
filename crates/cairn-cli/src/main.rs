//! cairn - a terminal coding agent that drives tools through markup

mod commands;
mod config;
mod confirm;
mod context;
mod mentions;
mod prompt;
mod tools;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use cairn_agent::parser::{self, Segment};
use cairn_agent::{
    Agent, AgentConfig, AgentEvent, AgentHandle, Dispatcher, Memory, Mode, Outcome, PolicyFlags,
    ProviderTransport, ScriptedTransport, ToolContext, ToolName, ToolParams, Transport,
};
use cairn_ai::{CostInfo, Model};
use cairn_ai::providers::openai::{API_KEY_ENV_VARS, OpenAIProvider};
use clap::Parser;
use tokio::sync::mpsc;

use crate::commands::CommandResult;
use crate::config::Config;

/// Model name that replays canned replies instead of calling a backend
const MOCK_MODEL: &str = "mock";

const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// cairn - AI-powered coding agent
#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task to run; starts an interactive session when omitted
    task: Option<String>,

    /// Model to use (default: openai/gpt-4o-mini, or "mock")
    #[arg(short, long)]
    model: Option<String>,

    /// JSON array of canned replies for the mock model
    #[arg(long)]
    responses_file: Option<PathBuf>,

    /// Approve every action without asking
    #[arg(long)]
    auto_approve: bool,

    /// Working directory for tools
    #[arg(long)]
    cwd: Option<PathBuf>,

    #[arg(long)]
    allow_read_files: bool,

    #[arg(long)]
    allow_edit_files: bool,

    /// Run commands the model marks as safe without asking
    #[arg(long)]
    allow_execute_safe_commands: bool,

    #[arg(long)]
    allow_execute_all_commands: bool,

    #[arg(long)]
    allow_use_browser: bool,

    #[arg(long)]
    allow_use_mcp: bool,

    /// Per-request LLM timeout in seconds
    #[arg(long)]
    llm_timeout: Option<u64>,

    /// Starting mode (act or plan)
    #[arg(long)]
    mode: Option<Mode>,

    /// Steps allowed per task
    #[arg(long)]
    max_steps: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

impl Args {
    /// Approval flags from the command line, OR-ed over the config file's
    fn policy(&self, base: PolicyFlags) -> PolicyFlags {
        PolicyFlags {
            auto_approve: base.auto_approve || self.auto_approve,
            read_files: base.read_files || self.allow_read_files,
            edit_files: base.edit_files || self.allow_edit_files,
            execute_safe_commands: base.execute_safe_commands || self.allow_execute_safe_commands,
            execute_all_commands: base.execute_all_commands || self.allow_execute_all_commands,
            browser: base.browser || self.allow_use_browser,
            mcp: base.mcp || self.allow_use_mcp,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cairn=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        let path = Config::config_path();
        Config::init_at(&path)
            .with_context(|| format!("Failed to create config at {}", path.display()))?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = Config::load();

    let cwd = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let cwd = cwd
        .canonicalize()
        .with_context(|| format!("Working directory {} is not accessible", cwd.display()))?;

    let mode = args.mode.or(cfg.mode).unwrap_or_default();
    let max_steps = args
        .max_steps
        .or(cfg.max_steps)
        .unwrap_or(AgentConfig::default().max_steps);
    let policy = args.policy(cfg.approvals);

    let mut backend = Backend::new(&args, &cfg);
    let transport = backend.transport()?;

    let registry = tools::default_registry();
    let system_prompt = prompt::build_system_prompt(&registry, mode, &cwd);
    let dispatcher = Dispatcher::new(
        registry,
        ToolContext::new(cwd.clone(), policy),
        Arc::new(confirm::StdinConfirmer),
    );

    let agent_config = AgentConfig {
        system_prompt,
        max_steps,
        memory: cfg.memory,
        mode,
    };
    let mut agent = Agent::new(agent_config, transport, dispatcher);

    spawn_interrupt_handler(agent.handle());
    let mut task_done = spawn_event_printer(&agent);

    if let Some(task) = args.task {
        run_one(&mut agent, &task, &cwd, &mut task_done).await;
        return Ok(());
    }

    run_interactive(&mut agent, &mut backend, &cwd, &mut task_done).await
}

/// Settings the LLM transport is built from; rebuilt when `/model` or
/// `/set-timeout` changes them
#[derive(Clone)]
struct Backend {
    model_id: String,
    timeout: Duration,
    responses_file: Option<PathBuf>,
    base_url: Option<String>,
    api_key: Option<String>,
    cost: CostInfo,
}

impl Backend {
    fn new(args: &Args, cfg: &Config) -> Self {
        let model_id = args
            .model
            .clone()
            .or(cfg.model.clone())
            .unwrap_or_else(|| config::DEFAULT_MODEL.to_string());
        let timeout = args
            .llm_timeout
            .or(cfg.llm_timeout_secs)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS);

        Self {
            model_id,
            timeout: Duration::from_secs(timeout),
            responses_file: args.responses_file.clone(),
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key(),
            cost: cfg.cost.clone(),
        }
    }

    fn transport(&self) -> anyhow::Result<Arc<dyn Transport>> {
        if self.model_id == MOCK_MODEL {
            let Some(path) = &self.responses_file else {
                bail!("The mock model needs canned replies: pass --responses-file <file.json>");
            };
            let scripted = ScriptedTransport::from_file(path)
                .with_context(|| format!("Failed to load responses from {}", path.display()))?;
            return Ok(Arc::new(scripted));
        }

        let Some(api_key) = self.api_key.clone() else {
            bail!(
                "No API key found.\n\nSet one with: export {}=your-key\nOr add it to the config file: cairn --init-config",
                API_KEY_ENV_VARS[0]
            );
        };
        let provider = OpenAIProvider::with_timeout(api_key, self.timeout)?;

        let mut model = Model::openrouter(self.model_id.as_str());
        if let Some(base_url) = &self.base_url {
            model.base_url = base_url.trim_end_matches('/').to_string();
        }
        model.cost = self.cost.clone();

        Ok(Arc::new(ProviderTransport::new(provider, model)))
    }

    /// Build the transport for `next` and install it, keeping `self` on failure
    fn switch(&mut self, next: Backend, agent: &mut Agent) -> anyhow::Result<()> {
        agent.set_transport(next.transport()?);
        *self = next;
        Ok(())
    }
}

/// First Ctrl-C cancels a running task; at the prompt it exits
fn spawn_interrupt_handler(handle: AgentHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                eprintln!("\n[Cancelling after the current step...]");
                handle.abort();
            } else {
                std::process::exit(130);
            }
        }
    });
}

/// Print progress lines for every event; signals once per finished task
fn spawn_event_printer(agent: &Agent) -> mpsc::UnboundedReceiver<()> {
    let mut receiver = agent.subscribe();
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut session_cost = 0.0;
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event printer skipped {} events", n);
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };

            match event {
                AgentEvent::StepStart { step, max_steps } => {
                    tracing::debug!("Step {}/{}", step, max_steps);
                }
                AgentEvent::AssistantReply { content } => {
                    if let Some(text) = narration(&content) {
                        println!("{}\n", text);
                    }
                }
                AgentEvent::ToolExecutionStart { tool_name, params } => {
                    println!("[{}]", describe_call(&tool_name, &params));
                }
                AgentEvent::ToolExecutionEnd {
                    tool_name,
                    result,
                    outcome,
                } => match outcome {
                    Outcome::Success => {
                        let first_line = result.lines().next().unwrap_or("");
                        println!("  {}\n", utils::truncate_chars(first_line, 100));
                    }
                    Outcome::Error => {
                        println!("[{} failed]", tool_name);
                        println!("  {}\n", utils::truncate_chars(&result, 200).replace('\n', " "));
                    }
                    Outcome::Denied => {
                        println!("[{} denied]\n", tool_name);
                    }
                },
                AgentEvent::Admonished { consecutive_errors } => {
                    println!("[{} consecutive tool errors, reminding the model of the format]\n", consecutive_errors);
                }
                AgentEvent::Summarized { history_len } => {
                    tracing::debug!("History summarized to {} messages", history_len);
                }
                AgentEvent::Usage { session_cost: total, .. } => {
                    session_cost = total;
                }
                AgentEvent::TaskEnd { result, reason } => {
                    tracing::debug!("Task ended: {:?}", reason);
                    println!("{}", result);
                    if session_cost > 0.0 {
                        println!("\n[Cost: ${:.4}]", session_cost);
                    }
                    if done_tx.send(()).is_err() {
                        break;
                    }
                }
                AgentEvent::TaskStart { .. } => {}
            }
        }
    });

    done_rx
}

/// Text the model wrote alongside a tool call, if any
///
/// Replies with no tool call, or only a completion, are the task result and
/// are printed when the task ends.
fn narration(content: &str) -> Option<String> {
    let segments = parser::parse(content);
    let acting = segments.iter().any(|s| {
        s.as_tool()
            .is_some_and(|call| call.tool() != Some(ToolName::AttemptCompletion))
    });
    if !acting {
        return None;
    }

    let text: Vec<&str> = segments
        .iter()
        .filter_map(Segment::as_text)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if text.is_empty() { None } else { Some(text.join("\n")) }
}

/// A one-line summary like `execute_command: cargo test`
fn describe_call(tool_name: &str, params: &ToolParams) -> String {
    const KEYS: &[&str] = &["command", "path", "url", "regex", "server_name", "uri", "question"];
    match KEYS.iter().find_map(|key| params.get_non_empty(key)) {
        Some(target) => format!(
            "{}: {}",
            tool_name,
            utils::truncate_chars(target.lines().next().unwrap_or(""), 80)
        ),
        None => tool_name.to_string(),
    }
}

async fn run_one(agent: &mut Agent, task: &str, cwd: &Path, task_done: &mut mpsc::UnboundedReceiver<()>) {
    let input = mentions::expand_mentions(task, cwd);
    agent.run(&input).await;

    // Let the printer finish the task's output before the next prompt
    if tokio::time::timeout(Duration::from_secs(1), task_done.recv())
        .await
        .is_err()
    {
        tracing::debug!("Timed out waiting for the event printer");
    }
}

/// Remembered files, relative to `cwd` where possible
fn context_listing(memory: &Memory, cwd: &Path) -> String {
    let lines: Vec<String> = memory
        .file_contexts()
        .map(|(path, content)| {
            let shown = path.strip_prefix(cwd).unwrap_or(path);
            format!("  {} ({} lines)", shown.display(), content.lines().count())
        })
        .collect();
    if lines.is_empty() {
        return "No files in context yet.".to_string();
    }
    format!("Files in context:\n{}", lines.join("\n"))
}

async fn run_interactive(
    agent: &mut Agent,
    backend: &mut Backend,
    cwd: &Path,
    task_done: &mut mpsc::UnboundedReceiver<()>,
) -> anyhow::Result<()> {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("cairn ({}, {} mode) in {}", backend.model_id, agent.mode(), cwd.display());
        eprintln!("Type /help for commands.\n");
    }

    while let Some(line) = utils::ask_line("> ".to_string()).await {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::parse_command(input) {
            match result {
                CommandResult::SetMode(mode) => {
                    agent.set_mode(mode);
                    println!("Switched to {} MODE.", mode.to_string().to_uppercase());
                }
                CommandResult::ShowCost => {
                    println!("Session cost: ${:.4}", agent.session_cost());
                }
                CommandResult::ShowContext => {
                    println!("{}", context_listing(&agent.session().memory, cwd));
                }
                CommandResult::SetModel(model_id) => {
                    let next = Backend {
                        model_id,
                        ..backend.clone()
                    };
                    match backend.switch(next, agent) {
                        Ok(()) => println!("Model set to: {}", backend.model_id),
                        Err(e) => println!("Error: {:#}", e),
                    }
                }
                CommandResult::SetTimeout(timeout) => {
                    let next = Backend {
                        timeout,
                        ..backend.clone()
                    };
                    match backend.switch(next, agent) {
                        Ok(()) => println!("LLM timeout set to: {} seconds.", timeout.as_secs_f64()),
                        Err(e) => println!("Error: {:#}", e),
                    }
                }
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        run_one(agent, input, cwd, task_done).await;
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_extend_config_approvals() {
        let args = Args::parse_from(["cairn", "--allow-edit-files", "--mode", "plan", "fix it"]);
        let base = PolicyFlags {
            read_files: true,
            ..Default::default()
        };
        let policy = args.policy(base);
        assert!(policy.read_files);
        assert!(policy.edit_files);
        assert!(!policy.execute_all_commands);
        assert_eq!(args.mode, Some(Mode::Plan));
        assert_eq!(args.task.as_deref(), Some("fix it"));
    }

    #[test]
    fn test_narration_only_when_acting() {
        assert_eq!(
            narration("Let me look.\n<read_file><path>a.rs</path></read_file>").as_deref(),
            Some("Let me look.")
        );
        assert_eq!(narration("All done, nothing to change."), None);
        assert_eq!(
            narration("Done.<attempt_completion><result>ok</result></attempt_completion>"),
            None
        );
    }

    #[test]
    fn test_describe_call() {
        let params: ToolParams = [("command", "cargo test\ncargo fmt"), ("requires_approval", "false")]
            .into_iter()
            .collect();
        assert_eq!(describe_call("execute_command", &params), "execute_command: cargo test");
        assert_eq!(describe_call("condense", &ToolParams::new()), "condense");
    }

    #[test]
    fn test_context_listing() {
        let cwd = Path::new("/work");
        let mut memory = Memory::new("system", Default::default());
        assert_eq!(context_listing(&memory, cwd), "No files in context yet.");

        memory.record_file_context("/work/src/lib.rs", "mod a;\nmod b;\n");
        memory.record_file_context("/tmp/notes.md", "todo");
        assert_eq!(
            context_listing(&memory, cwd),
            "Files in context:\n  /tmp/notes.md (1 lines)\n  src/lib.rs (2 lines)"
        );
    }

    #[test]
    fn test_backend_flags_override_config() {
        let cfg = Config {
            model: Some("from/config".into()),
            llm_timeout_secs: Some(30),
            ..Default::default()
        };
        let backend = Backend::new(&Args::parse_from(["cairn", "--llm-timeout", "5"]), &cfg);
        assert_eq!(backend.model_id, "from/config");
        assert_eq!(backend.timeout, Duration::from_secs(5));

        let backend = Backend::new(&Args::parse_from(["cairn", "-m", "mock"]), &cfg);
        assert_eq!(backend.model_id, MOCK_MODEL);
        assert_eq!(backend.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_mock_model_needs_responses() {
        let args = Args::parse_from(["cairn", "--model", "mock"]);
        let err = Backend::new(&args, &Config::default()).transport().err().unwrap();
        assert!(err.to_string().contains("--responses-file"));
    }

    #[tokio::test]
    async fn test_switch_keeps_backend_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replies.json");
        std::fs::write(&path, r#"["hello", "again"]"#).unwrap();
        let file = path.display().to_string();
        let args = Args::parse_from(["cairn", "--model", "mock", "--responses-file", file.as_str()]);

        let mut backend = Backend::new(&args, &Config::default());
        let dispatcher = Dispatcher::new(
            tools::default_registry(),
            ToolContext::new(dir.path(), PolicyFlags::default()),
            Arc::new(cairn_agent::StaticConfirmer(false)),
        );
        let mut agent = Agent::new(AgentConfig::default(), backend.transport().unwrap(), dispatcher);
        assert_eq!(agent.run("hi").await, "hello");

        let missing = Backend {
            responses_file: Some(dir.path().join("absent.json")),
            ..backend.clone()
        };
        assert!(backend.switch(missing, &mut agent).is_err());
        assert_eq!(backend.responses_file.as_deref(), Some(path.as_path()));

        let slower = Backend {
            timeout: Duration::from_secs(300),
            ..backend.clone()
        };
        backend.switch(slower, &mut agent).unwrap();
        assert_eq!(backend.timeout, Duration::from_secs(300));
        assert_eq!(agent.run("hi again").await, "hello");
    }
}
