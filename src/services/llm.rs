use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from the generative text service
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited after {0} retries")]
    RateLimited(u32),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed model output: {0}")]
    Malformed(String),

    #[error("No API key configured for the generative service")]
    NotConfigured,
}

/// Which pipeline stage a generation call serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPurpose {
    Interpret,
    Compose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the service for a strict JSON object
    pub json_mode: bool,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Generative text service seam
///
/// The interpreter and composer only see this trait, so tests can script
/// outputs and failures without a network.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Default OpenRouter endpoint (any OpenAI-compatible base URL works)
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const BACKOFF_MULTIPLIER: u64 = 2;

/// Chat-completions client for OpenAI-compatible services
pub struct LlmClient {
    base_url: String,
    api_key: Option<String>,
    interpret_model: String,
    compose_model: String,
    max_retries: u32,
    initial_backoff_ms: u64,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// Create a new client
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        interpret_model: String,
        compose_model: String,
        request_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            interpret_model,
            compose_model,
            max_retries: 3,
            initial_backoff_ms: 2000,
            client,
        })
    }

    /// Override the 429 retry policy
    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_for(&self, purpose: GenerationPurpose) -> &str {
        match purpose {
            GenerationPurpose::Interpret => &self.interpret_model,
            GenerationPurpose::Compose => &self.compose_model,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::new("system", request.system.clone()));
        messages.extend(request.messages.iter().cloned());

        let body = ChatRequest {
            model: self.model_for(request.purpose),
            messages,
            max_tokens: request.max_tokens,
            stream: false,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut retry_count = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "cast-scout")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    GenerationError::Malformed(format!("unparsable completion envelope: {}", e))
                })?;

                return parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .filter(|content| !content.trim().is_empty())
                    .ok_or_else(|| GenerationError::Malformed("empty completion".to_string()));
            }

            if status.as_u16() == 429 {
                if retry_count >= self.max_retries {
                    return Err(GenerationError::RateLimited(retry_count));
                }
                retry_count += 1;
                let backoff_ms = self.initial_backoff_ms * BACKOFF_MULTIPLIER.pow(retry_count - 1);
                tracing::warn!(
                    "Generative service rate limited, retrying in {}ms (attempt {}/{})",
                    backoff_ms,
                    retry_count,
                    self.max_retries
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                continue;
            }

            tracing::error!("Generative service returned {}: {}", status, text);
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message: truncate(&text, 300),
            });
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base_url: String) -> LlmClient {
        LlmClient::new(
            base_url,
            Some("test-key".to_string()),
            "interpret-model".to_string(),
            "compose-model".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry_policy(1, 1)
    }

    fn request(purpose: GenerationPurpose, json_mode: bool) -> GenerationRequest {
        GenerationRequest {
            purpose,
            system: "system prompt".to_string(),
            messages: vec![ChatMessage::new("user", "find me a stunt driver")],
            json_mode,
            max_tokens: 256,
            temperature: Some(0.0),
        }
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model": "interpret-model", "response_format": {"type": "json_object"}}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"content": "{\"gender\": null}"}}]}"#)
            .create_async()
            .await;

        let client = client_for(server.url());
        let output = client
            .generate(&request(GenerationPurpose::Interpret, true))
            .await
            .unwrap();

        assert_eq!(output, r#"{"gender": null}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_compose_uses_compose_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model": "compose-model"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "Here are my picks."}}]}"#)
            .create_async()
            .await;

        let client = client_for(server.url());
        let output = client
            .generate(&request(GenerationPurpose::Compose, false))
            .await
            .unwrap();

        assert_eq!(output, "Here are my picks.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = client_for(server.url());
        let err = client
            .generate(&request(GenerationPurpose::Compose, false))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::ApiError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_gives_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .expect(2)
            .create_async()
            .await;

        let client = client_for(server.url());
        let err = client
            .generate(&request(GenerationPurpose::Interpret, true))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::RateLimited(1)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_completion_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = client_for(server.url());
        let err = client
            .generate(&request(GenerationPurpose::Compose, false))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let client = LlmClient::new(
            DEFAULT_BASE_URL.to_string(),
            Some("  ".to_string()),
            "a".to_string(),
            "b".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(!client.is_configured());
        let err = client
            .generate(&request(GenerationPurpose::Compose, false))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }
}
