//! Chat-completion client
//!
//! Thin wrapper over a hosted chat-completion API. The `ChatModel` trait is
//! the seam used by the synthesizer and the insights flow; tests substitute
//! scripted models through it.

use crate::error::{QueryBotError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One chat-completion request: a system instruction, a single user turn,
/// and the sampling parameters for the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request and return the first completion's text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Hosted chat-completion client (OpenAI-compatible API).
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Build a client from an explicit credential, falling back to the
    /// `OPENAI_API_KEY` environment variable. The key is never logged.
    pub fn from_env(api_key: Option<String>) -> Result<Self> {
        let key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                QueryBotError::Synthesis(
                    "No API key provided and OPENAI_API_KEY is not set".to_string(),
                )
            })?;
        Ok(Self::new(key))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.user}));

        let body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "n": 1,
            "presence_penalty": 0,
            "frequency_penalty": request.frequency_penalty,
        });

        debug!(model = %request.model, "sending chat completion request");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryBotError::Synthesis(format!("LLM API call failed: {}", e)))?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QueryBotError::Synthesis(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown provider error");
            return Err(QueryBotError::Synthesis(format!(
                "LLM provider error: {}",
                message
            )));
        }

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| QueryBotError::Synthesis("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}
