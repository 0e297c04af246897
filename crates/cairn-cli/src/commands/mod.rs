//! Slash commands for interactive mode

use std::time::Duration;

use cairn_agent::Mode;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Switch between planning and acting
    SetMode(Mode),
    /// Show the session cost so far
    ShowCost,
    /// List the files the agent remembers
    ShowContext,
    /// Talk to a different model from the next task on
    SetModel(String),
    /// Change the per-request LLM timeout
    SetTimeout(Duration),
    /// Show a message to the user (not sent to agent)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command; `None` if the input is not one
pub fn parse_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let mut words = input.strip_prefix('/')?.split_whitespace();
    let command = words.next().unwrap_or("").to_lowercase();
    let arg = words.next();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "plan" => CommandResult::SetMode(Mode::Plan),
        "act" => CommandResult::SetMode(Mode::Act),
        "cost" => CommandResult::ShowCost,
        "context" => CommandResult::ShowContext,
        "model" => match arg {
            Some(model) => CommandResult::SetModel(model.to_string()),
            None => CommandResult::Message(
                "Error: Missing model name. Usage: /model <model_name>".to_string(),
            ),
        },
        "set-timeout" => match arg {
            Some(value) => parse_timeout(value),
            None => CommandResult::Message(
                "Error: Missing timeout value. Usage: /set-timeout <seconds>".to_string(),
            ),
        },
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

fn parse_timeout(value: &str) -> CommandResult {
    let Ok(seconds) = value.parse::<f64>() else {
        return CommandResult::Message("Error: Invalid timeout value. Must be a number.".to_string());
    };
    match Duration::try_from_secs_f64(seconds) {
        Ok(timeout) if !timeout.is_zero() => CommandResult::SetTimeout(timeout),
        _ => CommandResult::Message("Error: Timeout must be a positive number.".to_string()),
    }
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /plan                Switch to PLAN MODE (discuss before acting)
  /act                 Switch to ACT MODE (use tools to do the task)
  /cost                Show the cost of this session so far
  /context             List the files the agent has read or written
  /model <name>        Use another model, e.g. /model anthropic/claude-3-opus
  /set-timeout <secs>  Set the LLM request timeout, e.g. /set-timeout 60
  /quit, /exit, /q     Exit cairn

Mention files with @path to include their content in a task."#
        .to_string()
}
