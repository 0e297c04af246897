//! Web page fetching in place of an interactive browser

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest page body returned, in characters
const MAX_BODY_CHARS: usize = 20_000;

/// Tool for the browser actions; `launch` fetches the page over HTTP
pub struct BrowserTool {
    client: reqwest::Client,
}

impl BrowserTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch(&self, url: &str) -> ToolResult {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to read response from {}: {}", url, e)))?;

        if !status.is_success() {
            return Err(ToolError::Failed(format!(
                "Fetching {} returned HTTP {}:\n{}",
                url,
                status.as_u16(),
                crate::utils::truncate_chars(&body, 1000)
            )));
        }

        Ok(format!(
            "Fetched {} (HTTP {}):\n{}",
            url,
            status.as_u16(),
            crate::utils::truncate_chars(&body, MAX_BODY_CHARS)
        ))
    }
}

impl Default for BrowserTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> ToolName {
        ToolName::BrowserAction
    }

    fn description(&self) -> &str {
        "Interact with web pages. Actions: launch (fetch the page at url and return its content), click, type, scroll_down, scroll_up, close. Only launch and close are available without an interactive browser."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("action", "One of: launch, click, type, scroll_down, scroll_up, close", true),
            ("url", "URL to open (for launch)", false),
            ("coordinate", "x,y position (for click)", false),
            ("text", "Text to type (for type)", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
        let action = params
            .get_non_empty("action")
            .map(str::trim)
            .ok_or_else(|| ToolError::InvalidValue("missing 'action'".into()))?;

        match action {
            "launch" => {
                let url = params
                    .get_non_empty("url")
                    .map(str::trim)
                    .ok_or_else(|| ToolError::InvalidValue("'launch' requires a url".into()))?;
                self.fetch(url).await
            }
            "close" => Ok("Browser closed.".to_string()),
            "click" | "type" | "scroll_down" | "scroll_up" => Err(ToolError::Failed(format!(
                "Action '{}' needs an interactive browser, which is not available. Use 'launch' to fetch a page's content instead.",
                action
            ))),
            other => Err(ToolError::InvalidValue(format!(
                "unknown browser action '{}'",
                other
            ))),
        }
    }
}
