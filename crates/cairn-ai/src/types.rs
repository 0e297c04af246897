//! Core types for LLM interactions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Cost information for a model (dollars per million tokens)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
}

/// Token usage for one completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Dollar cost, when known
    #[serde(default)]
    pub cost: f64,
}

impl Usage {
    /// Compute cost from per-million-token prices
    pub fn calculate_cost(&self, cost: &CostInfo) -> f64 {
        (self.prompt_tokens as f64 / 1_000_000.0) * cost.input
            + (self.completion_tokens as f64 / 1_000_000.0) * cost.output
    }

    /// Fill in `cost` from prices if the backend did not report one
    pub fn with_cost_from(mut self, cost: &CostInfo) -> Self {
        if self.cost == 0.0 {
            self.cost = self.calculate_cost(cost);
        }
        self
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier as the backend knows it (e.g. "anthropic/claude-sonnet-4")
    pub id: String,
    /// Base URL for API calls, without the `/chat/completions` suffix
    pub base_url: String,
    /// Cost per million tokens
    #[serde(default)]
    pub cost: CostInfo,
    /// Maximum output tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Additional headers for API calls
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Model {
    pub const OPENROUTER_BASE_URL: &'static str = "https://openrouter.ai/api/v1";

    /// A model served through OpenRouter
    pub fn openrouter(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: Self::OPENROUTER_BASE_URL.to_string(),
            cost: CostInfo::default(),
            max_tokens: None,
            temperature: None,
            headers: HashMap::new(),
        }
    }
}

/// A completed reply from the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// `None` means the backend produced nothing at all, which is
    /// distinct from an empty string.
    pub content: Option<String>,
    pub usage: Option<Usage>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            usage: None,
        }
    }

    /// A reply carrying no content
    pub fn empty() -> Self {
        Self::default()
    }
}
