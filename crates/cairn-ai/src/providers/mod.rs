//! LLM provider implementations

pub mod openai;

use crate::{Error, Message, Model, Reply, Result};
use async_trait::async_trait;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request one complete (non-streamed) reply for the given history
    async fn complete(&self, model: &Model, messages: &[Message]) -> Result<Reply>;
}

/// Get an API key from the provided value or the first set environment variable
pub fn get_api_key(provided: Option<&str>, env_vars: &[&str]) -> Result<String> {
    if let Some(key) = provided.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }

    env_vars
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .ok_or(Error::InvalidApiKey)
}
