//! Transport abstraction between the conversation driver and an LLM

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cairn_ai::providers::LlmProvider;
use cairn_ai::{Message, Model, Reply, Result};
use parking_lot::Mutex;

use crate::error::Error;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Check if an error message looks transient
fn is_retryable_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("overloaded")
        || ["500", "502", "503", "504"].iter().any(|code| lower.contains(code))
}

/// Sends the conversation to an LLM and returns its reply.
///
/// An `Err` or a reply whose `content` is `None` both mean the backend
/// produced no response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, history: &[Message]) -> Result<Reply>;
}

/// Direct provider transport with retries
pub struct ProviderTransport {
    provider: Box<dyn LlmProvider>,
    model: Model,
    retry_config: RetryConfig,
}

impl ProviderTransport {
    pub fn new(provider: impl LlmProvider + 'static, model: Model) -> Self {
        Self {
            provider: Box::new(provider),
            model,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn send(&self, history: &[Message]) -> Result<Reply> {
        let mut attempt = 0u32;
        loop {
            match self.provider.complete(&self.model, history).await {
                Ok(reply) => {
                    let usage = reply.usage.map(|u| u.with_cost_from(&self.model.cost));
                    return Ok(Reply { usage, ..reply });
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    let retryable = e.is_retryable() || is_retryable_error(&error_msg);

                    if attempt < self.retry_config.max_retries && retryable {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt + 1,
                            self.retry_config.max_retries + 1,
                            error_msg,
                            delay
                        );
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(e);
                }
            }
        }
    }
}

/// Replays a fixed sequence of replies, then reports no response
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_gaps(replies.into_iter().map(|r| Some(r.into())))
    }

    /// Replies where `None` stands for "no response"
    pub fn with_gaps(replies: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Load replies from a JSON array of strings (or nulls)
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let replies: Vec<Option<String>> = serde_json::from_str(json).map_err(|e| {
            Error::Script(format!("expected a JSON array of strings: {}", e))
        })?;
        Ok(Self::with_gaps(replies))
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Script(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// How many times `send` has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _history: &[Message]) -> Result<Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().pop_front().flatten();
        Ok(Reply {
            content: next,
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_ai::{CostInfo, Usage};
    use std::sync::Arc;

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retryable_strings() {
        assert!(is_retryable_error("HTTP error: operation timed out"));
        assert!(is_retryable_error("API error: upstream (type: http_503)"));
        assert!(!is_retryable_error("Invalid or missing API key"));
    }

    /// Fails a set number of times, then answers.
    struct FlakyProvider {
        failures_left: Arc<Mutex<u32>>,
        error: fn() -> cairn_ai::Error,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn complete(&self, _model: &Model, _messages: &[Message]) -> Result<Reply> {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err((self.error)());
            }
            Ok(Reply {
                content: Some("ok".into()),
                usage: Some(Usage {
                    prompt_tokens: 1_000_000,
                    completion_tokens: 0,
                    cost: 0.0,
                }),
            })
        }
    }

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn test_provider_transport_retries_then_succeeds() {
        let mut model = Model::openrouter("test/model");
        model.cost = CostInfo {
            input: 2.0,
            output: 0.0,
        };
        let transport = ProviderTransport::new(
            FlakyProvider {
                failures_left: Arc::new(Mutex::new(2)),
                error: || cairn_ai::Error::RateLimited { retry_after: None },
            },
            model,
        )
        .with_retry_config(fast_retries());

        let reply = transport.send(&[Message::user("hi")]).await.unwrap();
        assert_eq!(reply.content.as_deref(), Some("ok"));
        assert_eq!(reply.usage.unwrap().cost, 2.0);
    }

    #[tokio::test]
    async fn test_provider_transport_gives_up_on_fatal_error() {
        let failures = Arc::new(Mutex::new(5));
        let transport = ProviderTransport::new(
            FlakyProvider {
                failures_left: Arc::clone(&failures),
                error: || cairn_ai::Error::InvalidApiKey,
            },
            Model::openrouter("test/model"),
        )
        .with_retry_config(fast_retries());

        assert!(transport.send(&[]).await.is_err());
        assert_eq!(*failures.lock(), 4);
    }

    #[tokio::test]
    async fn test_scripted_transport() {
        let transport = ScriptedTransport::from_json(r#"["first", null, ""]"#).unwrap();
        assert_eq!(transport.remaining(), 3);

        assert_eq!(transport.send(&[]).await.unwrap().content.as_deref(), Some("first"));
        assert_eq!(transport.send(&[]).await.unwrap().content, None);
        assert_eq!(transport.send(&[]).await.unwrap().content.as_deref(), Some(""));
        assert_eq!(transport.send(&[]).await.unwrap().content, None);
        assert_eq!(transport.calls(), 4);
    }

    #[test]
    fn test_scripted_transport_rejects_bad_json() {
        let err = ScriptedTransport::from_json(r#"{"not": "a list"}"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid scripted responses"));
    }
}
