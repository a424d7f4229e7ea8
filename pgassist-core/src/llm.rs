//! Chat model client for pgassist
//!
//! Provides a `ChatModel` trait and an implementation for OpenAI-compatible
//! chat-completions APIs. The SQL chain only needs single-prompt completions
//! with optional stop sequences, plus the token usage reported by the provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::ModelConfig;

// ============================================================================
// ChatModel trait
// ============================================================================

/// Abstraction over chat model providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `prompt` as a single user message. Generation halts at the first
    /// occurrence of any `stop` sequence.
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<Completion, ModelError>;

    /// Model identifier, used for logging and cost lookup.
    fn model_name(&self) -> &str;
}

/// Token counts reported for one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing completion in response")]
    MissingCompletion,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Config types
// ============================================================================

/// OpenAI chat client configuration
#[derive(Clone)]
pub struct ChatModelConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ChatModelConfig {
    /// Build from the `[model]` section.
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Self {
        Self {
            api_key: api_key.into(),
            model: config.name.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }
}

impl std::fmt::Debug for ChatModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModelConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

// ============================================================================
// OpenAIChatClient
// ============================================================================

/// Chat client for the OpenAI chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIChatClient {
    client: Client,
    config: ChatModelConfig,
    base_url: String,
}

impl OpenAIChatClient {
    pub fn new(config: ChatModelConfig) -> Result<Self, ModelError> {
        Self::with_base_url(config, "https://api.openai.com/v1".to_string())
    }

    /// Create a client with a custom base URL (compatible providers, tests)
    pub fn with_base_url(config: ChatModelConfig, base_url: String) -> Result<Self, ModelError> {
        if config.api_key.is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatClient {
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            stop: stop.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAIErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Chat completion API error");

            return Err(ModelError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ModelError::MissingCompletion)?;

        Ok(Completion {
            text,
            usage: chat_response.usage.unwrap_or_default(),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// TESTS
// ============================================================================
