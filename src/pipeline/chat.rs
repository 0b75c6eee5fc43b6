//! Chat wire types and providers.
//!
//! One hand-rolled client for the OpenAI-compatible
//! `/v1/chat/completions` endpoint; no provider SDK. The [`ChatProvider`]
//! trait is the seam the engine talks through, so the simulated provider
//! and test doubles slot in without touching dispatch or retry logic.

use crate::error::ReviewError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env var for the endpoint base, e.g. `http://localhost:11434`.
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
/// Env var for the bearer token. Empty or unset means no auth header,
/// which local endpoints accept.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of one `/v1/chat/completions` call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Anything that can answer a chat request.
///
/// Errors come back as [`ReviewError::Provider`]; the engine decides
/// whether they are retryable.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ReviewError>;
}

/// HTTP client for OpenAI-compatible endpoints.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    /// Read `OPENAI_BASE_URL` / `OPENAI_API_KEY` from the environment.
    pub fn from_env() -> Result<Self, ReviewError> {
        let base_url =
            std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty());
        Self::new(base_url, api_key)
    }

    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ReviewError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReviewError::Internal(format!("http client: {e}")))?;
        Ok(OpenAiCompatProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ReviewError> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| ReviewError::Provider {
            detail: format!("transport: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::Provider {
                detail: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| ReviewError::Provider {
                detail: format!("response decoding: {e}"),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReviewError::Provider {
                detail: "empty completion".into(),
            })
    }
}

/// Offline provider: echoes the outbound request instead of calling anyone.
///
/// The echo is deterministic, so dry runs can be diffed and the report
/// layout inspected without spending tokens.
pub struct SimulatedProvider {
    detailed: bool,
}

impl SimulatedProvider {
    pub fn new(detailed: bool) -> Self {
        SimulatedProvider { detailed }
    }
}

#[async_trait]
impl ChatProvider for SimulatedProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ReviewError> {
        let header = if self.detailed {
            "# No calls performed (detailed)"
        } else {
            "# No calls performed"
        };
        let messages = serde_json::to_string_pretty(&request.messages)
            .map_err(|e| ReviewError::Internal(format!("message encoding: {e}")))?;
        Ok(format!(
            "{header}\nOriginal request (model: {}, temperature: {}, top_p: {}):\n{messages}",
            request.model,
            request.temperature.unwrap_or(0.0),
            request.top_p.unwrap_or(0.0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::system("hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "hello");
    }

    #[test]
    fn request_skips_absent_sampling_params() {
        let request = ChatRequest {
            model: "gemma3-27b".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
            top_p: Some(0.4),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert_eq!(value["top_p"], 0.4);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let provider =
            OpenAiCompatProvider::new("http://localhost:11434/".into(), None).unwrap();
        assert_eq!(
            provider.endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn simulated_echo_is_deterministic() {
        let request = ChatRequest {
            model: "gemma3-27b".into(),
            messages: vec![
                ChatMessage::system("[persona]"),
                ChatMessage::user("payload"),
            ],
            temperature: Some(0.3),
            top_p: Some(0.2),
        };
        let provider = SimulatedProvider::new(false);
        let first = provider.chat(&request).await.unwrap();
        let second = provider.chat(&request).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("# No calls performed\n"));
        assert!(first.contains("gemma3-27b"));
        assert!(first.contains("temperature: 0.3"));
        assert!(first.contains("[persona]"));
        assert!(first.contains("payload"));
    }

    #[tokio::test]
    async fn simulated_detailed_marks_itself() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("x")],
            temperature: Some(0.1),
            top_p: Some(0.1),
        };
        let echo = SimulatedProvider::new(true).chat(&request).await.unwrap();
        assert!(echo.starts_with("# No calls performed (detailed)"));
    }
}
