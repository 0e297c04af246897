//! Shell command execution tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Maximum output size in bytes before truncation
const MAX_OUTPUT_SIZE: usize = 100_000; // 100KB
/// Maximum number of lines before truncation
const MAX_OUTPUT_LINES: usize = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Tool for executing shell commands
pub struct BashTool;

impl BashTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines collected from one output stream, up to the caps
#[derive(Default)]
struct Captured {
    text: String,
    lines: usize,
    truncated: bool,
}

impl Captured {
    fn push(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.lines >= MAX_OUTPUT_LINES || self.text.len() + line.len() > MAX_OUTPUT_SIZE {
            self.truncated = true;
            return;
        }
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.lines += 1;
    }

    fn finish(mut self, stream: &str) -> String {
        if self.truncated {
            self.text.push_str(&format!(
                "\n\n... ({} truncated at {} lines / {}KB)",
                stream,
                self.lines,
                MAX_OUTPUT_SIZE / 1024
            ));
        }
        self.text
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> ToolName {
        ToolName::ExecuteCommand
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory. Returns stdout and stderr. Set requires_approval to false only for safe, read-only commands."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("command", "The shell command to execute", true),
            (
                "requires_approval",
                "true if the command may change the system or is otherwise risky, false for safe commands",
                false,
            ),
            ("timeout", "Timeout in seconds (default: 120)", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let command = params
            .get_non_empty("command")
            .ok_or_else(|| ToolError::InvalidValue("missing 'command'".into()))?;
        let timeout_secs = match params.get_non_empty("timeout") {
            Some(t) => t
                .trim()
                .parse::<u64>()
                .map_err(|_| ToolError::InvalidValue(format!("timeout '{}' is not a number", t)))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut child = Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(&ctx.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Failed(format!("Failed to spawn command: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Unexpected("stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::Unexpected("stderr was not captured".into()))?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        let mut output = Captured::default();
        let mut error_output = Captured::default();

        let deadline =
            tokio::time::Instant::now() + tokio::time::Duration::from_secs(timeout_secs);

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = child.kill().await;
                    return Err(ToolError::Failed(format!(
                        "{}\n{}\n\nCommand timed out after {} seconds",
                        output.finish("stdout"),
                        error_output.finish("stderr"),
                        timeout_secs
                    )));
                }
                line = stdout_reader.next_line(), if stdout_open => {
                    match line {
                        Ok(Some(l)) => output.push(&l),
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            error_output.push(&format!("Stdout read error: {}", e));
                            stdout_open = false;
                        }
                    }
                }
                line = stderr_reader.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(l)) => error_output.push(&l),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            error_output.push(&format!("Stderr read error: {}", e));
                            stderr_open = false;
                        }
                    }
                }
                status = child.wait(), if !stdout_open && !stderr_open => {
                    let exit_status = status
                        .map_err(|e| ToolError::Failed(format!("Failed to wait for command: {}", e)))?;

                    let mut result = output.finish("stdout");
                    let errors = error_output.finish("stderr");
                    if !errors.is_empty() {
                        if !result.is_empty() {
                            result.push('\n');
                        }
                        result.push_str(&errors);
                    }
                    if result.is_empty() {
                        result = "(no output)".to_string();
                    }

                    if exit_status.success() {
                        return Ok(result);
                    }
                    let code = exit_status.code().unwrap_or(-1);
                    return Err(ToolError::Failed(format!(
                        "{}\n\nCommand exited with code {}",
                        result, code
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext::new(dir, PolicyFlags::default())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let params: ToolParams = [("command", "ls && echo done >&2")].into_iter().collect();
        let output = BashTool::new().execute(&params, &ctx(dir.path())).await.unwrap();
        assert_eq!(output, "marker.txt\ndone");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let params: ToolParams = [("command", "echo oops; exit 3")].into_iter().collect();
        let err = BashTool::new().execute(&params, &ctx(dir.path())).await.unwrap_err();
        assert_eq!(err.to_string(), "oops\n\nCommand exited with code 3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let params: ToolParams = [("command", "sleep 5"), ("timeout", "1")].into_iter().collect();
        let err = BashTool::new().execute(&params, &ctx(dir.path())).await.unwrap_err();
        assert!(err.to_string().ends_with("Command timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn test_bad_timeout_value() {
        let dir = tempfile::tempdir().unwrap();
        let params: ToolParams = [("command", "true"), ("timeout", "soon")].into_iter().collect();
        let err = BashTool::new().execute(&params, &ctx(dir.path())).await.unwrap_err();
        assert_eq!(err.to_string(), "value error: timeout 'soon' is not a number");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let params: ToolParams = [("command", "true")].into_iter().collect();
        let output = BashTool::new().execute(&params, &ctx(dir.path())).await.unwrap();
        assert_eq!(output, "(no output)");
    }
}
