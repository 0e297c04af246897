//! Configuration file support

use cairn_agent::{MemoryConfig, Mode, PolicyFlags};
use cairn_ai::CostInfo;
use cairn_ai::providers::{get_api_key, openai::API_KEY_ENV_VARS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Configuration for cairn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Chat-completions endpoint (defaults to OpenRouter)
    pub base_url: Option<String>,
    /// API key (alternative to environment variables)
    pub api_key: Option<String>,
    /// Steps allowed per task
    pub max_steps: Option<usize>,
    /// Per-request LLM timeout in seconds
    pub llm_timeout_secs: Option<u64>,
    /// Starting mode (act or plan)
    pub mode: Option<Mode>,
    /// Categories of tool use that run without asking
    pub approvals: PolicyFlags,
    pub memory: MemoryConfig,
    /// Dollars per million tokens, used when the backend reports no cost
    pub cost: CostInfo,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cairn")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CAIRN_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults with a warning
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Write the example config to `path` unless a file is already there
    pub fn init_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, example_config())
    }

    /// Get the API key, checking config then env
    pub fn api_key(&self) -> Option<String> {
        get_api_key(self.api_key.as_deref(), API_KEY_ENV_VARS).ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# cairn configuration file
# Place at ~/.config/cairn/config.toml (Linux) or set CAIRN_CONFIG_PATH

# Default model to use (any OpenRouter model id, or "mock" with --responses-file)
model = "openai/gpt-4o-mini"

# Chat-completions endpoint of an OpenAI-compatible backend
# base_url = "https://openrouter.ai/api/v1"

# API key (optional - OPENROUTER_API_KEY or OPENAI_API_KEY also work)
# api_key = "sk-or-..."

max_steps = 20
llm_timeout_secs = 120

# Starting mode: "act" or "plan"
mode = "act"

# Tool categories that run without asking for confirmation
[approvals]
auto_approve = false
read_files = true
edit_files = false
execute_safe_commands = false
execute_all_commands = false
browser = false
mcp = false

[memory]
max_messages = 50
summary_char_limit = 200

# Dollars per million tokens, used when the backend reports no cost
[cost]
input = 0.0
output = 0.0
"#
}
