//! Asking the operator a clarifying question

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;

use crate::utils;

/// Tool that puts a question to the operator on the terminal
pub struct FollowupTool;

#[async_trait]
impl Tool for FollowupTool {
    fn name(&self) -> ToolName {
        ToolName::AskFollowupQuestion
    }

    fn description(&self) -> &str {
        "Ask the user a question when the task is ambiguous or you need details you cannot find yourself. Keep the question clear and specific."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("question", "The question to ask the user", true),
            ("options", "Optional JSON array of 2-5 answer choices", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
        let question = params
            .get_non_empty("question")
            .ok_or_else(|| ToolError::InvalidValue("missing 'question'".into()))?;
        let options = parse_options(params.get_non_empty("options"))?;

        let answer = utils::ask_line(format_question(question, &options))
            .await
            .ok_or_else(|| {
                ToolError::Failed("No answer was given (end of input).".to_string())
            })?;
        Ok(format!("User answered: {}", interpret_answer(&answer, &options)))
    }
}

fn parse_options(raw: Option<&str>) -> Result<Vec<String>, ToolError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
            ToolError::InvalidValue(format!("'options' must be a JSON array of strings: {}", e))
        }),
    }
}

fn format_question(question: &str, options: &[String]) -> String {
    let mut text = format!("\n? {}\n", question.trim());
    for (i, option) in options.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", i + 1, option));
    }
    text.push_str("> ");
    text
}

/// A bare option number selects that option
fn interpret_answer(answer: &str, options: &[String]) -> String {
    let answer = answer.trim();
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i))
        .cloned()
        .unwrap_or_else(|| answer.to_string())
}
