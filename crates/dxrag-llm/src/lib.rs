//! dxrag-llm
//!
//! Chat-completion seam used by the diagnosis pipeline, and an
//! OpenAI-compatible HTTP implementation of it.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;

pub use client::LlmClient;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: "system".into(), content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: "user".into(), content: content.into() } }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// HTTP 429 from the endpoint; the only failure worth a retry.
    #[error("rate limited by model endpoint: {0}")]
    RateLimited(String),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model returned an empty reply")]
    EmptyReply,
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool { matches!(self, Self::RateLimited(_)) }
}

/// One chat-style completion: messages in, free reply text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// `[llm]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://hub.qazcode.ai/v1".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: None,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}
