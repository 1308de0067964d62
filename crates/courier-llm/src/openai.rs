//! OpenAI-compatible chat completions provider
//!
//! One provider covers every backend speaking the OpenAI chat API:
//! OpenAI itself, Groq, and any compatible gateway. Only the base URL,
//! key, and model differ per instance.

use crate::error::{Error, Result};
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, Message, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Groq API base URL (OpenAI-compatible)
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Provider configuration
#[derive(Clone)]
pub struct ChatConfig {
    /// Provider id, used in logs and routing
    pub name: String,
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("name", &self.name)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Mask API key for safe display
fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

/// Sanitize API error messages so keys never reach logs or users
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check the configured key.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "Provider rate limit exceeded. Please wait.".to_string();
    }

    if error.len() < 200 && !lower.contains("key") {
        return error.to_string();
    }

    "An API error occurred. Please try again.".to_string()
}

impl ChatConfig {
    /// Create a configuration with the given name, key, and base URL.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI-compatible provider
pub struct ChatProvider {
    client: Client,
    config: ChatConfig,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl ChatProvider {
    /// Create a provider from its configuration.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn convert_message(msg: &Message) -> ChatMessage {
        ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ChatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = %self.config.name))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        };

        let chat_request = ChatRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %model, "Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| Error::Network(sanitize_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Api(sanitize_api_error(&error_text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let choice = chat_response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            model: chat_response.model,
            usage: chat_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("gsk_1234567890abcdef"), "gsk_...cdef");
    }

    #[test]
    fn test_debug_never_prints_key() {
        let config = ChatConfig::new("groq", "gsk_1234567890abcdef", GROQ_API_BASE, "llama");
        let printed = format!("{config:?}");
        assert!(!printed.contains("1234567890"));
        assert!(printed.contains("gsk_...cdef"));
    }

    #[test]
    fn test_sanitize_api_error() {
        assert!(sanitize_api_error("Invalid API key provided").contains("authentication"));
        assert!(sanitize_api_error("Rate limit reached for model").contains("rate limit"));
        assert_eq!(sanitize_api_error("model not found"), "model not found");
    }
}
