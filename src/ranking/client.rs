//! Reasoning-service seam and its OpenAI-compatible implementation

use crate::config::LlmConfig;
use crate::{FlyTickerError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Models known to honour `response_format = json_object`
const JSON_MODE_MODELS: [&str; 4] = ["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo", "gpt-4-turbo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Rendered messages plus model parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

/// Reasoning-service failures, classified for the retry policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Timeouts, connection failures, 429 and 5xx are worth another attempt
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Timeout(_) | ClientError::Connection(_) => true,
            ClientError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            ClientError::Decode(_) => false,
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::Status { status: 429, .. })
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = match status.as_u16() {
            401 | 403 => "authentication failed, check the API key".to_string(),
            429 => "rate limit exceeded".to_string(),
            _ => {
                let reason = status.canonical_reason().unwrap_or("Unknown error");
                let snippet: String = body.chars().take(200).collect();
                if snippet.is_empty() {
                    reason.to_string()
                } else {
                    format!("{reason} - {snippet}")
                }
            }
        };
        ClientError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::from_status(status, "")
        } else {
            ClientError::Connection(err.to_string())
        }
    }
}

/// External reasoning service that completes a chat exchange
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Send one request and return the assistant message content
    async fn complete(&self, request: &ReasoningRequest) -> std::result::Result<String, ClientError>;
}

/// Chat-completions client for OpenAI-compatible endpoints
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    json_mode: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Build a client from the `llm` configuration section
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no API key is configured or the HTTP
    /// client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FlyTickerError::config(
                    "LLM API key is missing. Set llm.api_key or OPENAI_API_KEY",
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("flyticker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FlyTickerError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            json_mode: config.json_mode,
        })
    }

    fn response_format(&self, model: &str) -> Option<ResponseFormat> {
        (self.json_mode && supports_json_mode(model)).then_some(ResponseFormat {
            kind: "json_object",
        })
    }
}

/// Whether the model is known to accept the JSON response format
#[must_use]
pub fn supports_json_mode(model: &str) -> bool {
    JSON_MODE_MODELS.contains(&model)
}

#[async_trait]
impl ReasoningClient for OpenAiClient {
    #[instrument(name = "reasoning_request", level = "debug", skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ReasoningRequest) -> std::result::Result<String, ClientError> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: &request.messages,
            response_format: self.response_format(&request.model),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(
            "Reasoning service responded {} in {:.3}s",
            status,
            started.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = ClientError::from_status(status, &error_text);
            warn!("Reasoning service error: {}", err);
            return Err(err);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ClientError::Decode("response contained no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ClientError::Timeout("t".into()), true)]
    #[case(ClientError::Connection("c".into()), true)]
    #[case(ClientError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), true)]
    #[case(ClientError::from_status(StatusCode::BAD_GATEWAY, "upstream"), true)]
    #[case(ClientError::from_status(StatusCode::UNAUTHORIZED, ""), false)]
    #[case(ClientError::from_status(StatusCode::FORBIDDEN, ""), false)]
    #[case(ClientError::from_status(StatusCode::BAD_REQUEST, "bad"), false)]
    #[case(ClientError::Decode("garbage".into()), false)]
    fn test_error_classification(#[case] err: ClientError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(ClientError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_rate_limited());
        assert!(!ClientError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_rate_limited());
    }

    #[test]
    fn test_json_mode_models() {
        assert!(supports_json_mode("gpt-4o-mini"));
        assert!(!supports_json_mode("llama3"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        let err = OpenAiClient::new(&config).err().unwrap();
        assert!(matches!(err, FlyTickerError::Config { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("evaluate")];
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            temperature: 0.3,
            messages: &messages,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "evaluate");
        assert_eq!(json["response_format"]["type"], "json_object");
    }
}
