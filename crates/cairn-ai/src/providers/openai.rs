//! OpenAI-compatible Chat Completions provider (OpenAI, OpenRouter, local servers)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::{
    error::{Error, Result},
    types::{Message, Model, Reply, Usage},
};

/// Environment variables consulted for an API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["OPENROUTER_API_KEY", "OPENAI_API_KEY"];

/// Chat-completions API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new provider with an API key and no request timeout
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create a provider whose requests give up after `timeout`
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = super::get_api_key(None, API_KEY_ENV_VARS)?;
        Ok(Self::new(api_key))
    }

    fn build_request(&self, model: &Model, messages: &[Message]) -> ChatRequest {
        ChatRequest {
            model: model.id.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            usage: model
                .base_url
                .contains("openrouter.ai")
                .then_some(UsageOptions { include: true }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn complete(&self, model: &Model, messages: &[Message]) -> Result<Reply> {
        let request = self.build_request(model, messages);
        let url = format!("{}/chat/completions", model.base_url.trim_end_matches('/'));

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);
        for (key, value) in &model.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        tracing::debug!("POST {} ({} messages)", url, messages.len());
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &body));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::InvalidApiKey,
        _ => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.to_string());
            Error::api(format!("http_{}", status.as_u16()), message)
        }
    }
}

/// Parse a successful chat-completions body into a reply
fn parse_response(body: &str) -> Result<Reply> {
    let response: ChatResponse = serde_json::from_str(body)?;

    // OpenRouter reports upstream failures inside a 200 body
    if let Some(err) = response.error {
        return Err(Error::api(
            err.code.map(|c| c.to_string()).unwrap_or_else(|| "error".into()),
            err.message,
        ));
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .map(|m| m.content.unwrap_or_default());

    let usage = response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        cost: u.cost.unwrap_or(0.0),
    });

    Ok(Reply { content, usage })
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct UsageOptions {
    include: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_maps_roles() {
        let provider = OpenAIProvider::new("sk-test");
        let model = Model::openrouter("openai/gpt-4o-mini");
        let messages = vec![Message::system("sys"), Message::user("hi")];

        let request = provider.build_request(&model, &messages);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], false);
        assert_eq!(json["usage"]["include"], true);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_usage_option_only_for_openrouter() {
        let provider = OpenAIProvider::new("sk-test");
        let mut model = Model::openrouter("gpt-4o");
        model.base_url = "http://localhost:8080/v1".into();

        let json = serde_json::to_value(provider.build_request(&model, &[])).unwrap();
        assert!(json.get("usage").is_none());
    }

    #[test]
    fn test_parse_response_with_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "cost": 0.0004}
        }"#;
        let reply = parse_response(body).unwrap();
        assert_eq!(reply.content.as_deref(), Some("hello"));
        let usage = reply.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.cost, 0.0004);
    }

    #[test]
    fn test_parse_response_null_content_is_empty_string() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let reply = parse_response(body).unwrap();
        assert_eq!(reply.content.as_deref(), Some(""));
        assert!(reply.usage.is_none());
    }

    #[test]
    fn test_parse_response_without_choices_is_no_content() {
        let reply = parse_response(r#"{"choices": []}"#).unwrap();
        assert_eq!(reply.content, None);
    }

    #[test]
    fn test_parse_response_embedded_error() {
        let body = r#"{"error": {"message": "Provider returned error", "code": 502}}"#;
        let err = parse_response(body).unwrap_err();
        match err {
            Error::Api { error_type, message } => {
                assert_eq!(error_type, "502");
                assert_eq!(message, "Provider returned error");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            Error::RateLimited { retry_after: Some(7) }
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, ""),
            Error::InvalidApiKey
        ));
        let err = status_error(
            StatusCode::BAD_GATEWAY,
            None,
            r#"{"error": {"message": "upstream down"}}"#,
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("upstream down"));
    }
}
