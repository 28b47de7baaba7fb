//! OpenAI-compatible chat completions over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::{ChatMessage, ChatModel, LlmError, LlmSettings};

/// Request body for chat completions (OpenAI format).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

/// Response: choices[0].message.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for chat completions.
pub struct LlmClient {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            temperature: settings.temperature,
        })
    }

    pub fn completions_url(&self) -> &str { &self.completions_url }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest { model: &self.model, messages, temperature: self.temperature };
        let mut req = self.client.post(&self.completions_url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await.map_err(|e| LlmError::Transport(e.to_string()))?;
        let status = res.status();
        let text = res.text().await.map_err(|e| LlmError::Transport(e.to_string()))?;
        tracing::debug!(
            event = "llm.chat.completed",
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "chat completion returned"
        );
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited(text));
        }
        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body: text });
        }
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Decode(format!("{e}; body: {text}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyReply)
    }
}
