//! Best-effort rewrite of patient text into a terse clinical summary.
use std::sync::Arc;
use std::time::{Duration, Instant};

use dxrag_llm::{ChatMessage, ChatModel};

use crate::retry::complete_with_retry;

const NORMALIZE_INSTRUCTION: &str = "You are a clinical documentation assistant. Rewrite the patient's complaint as a dry, terse clinical summary: key symptoms, their duration and localisation, relevant history and objective findings. Do not diagnose, do not advise, no preamble. Answer in the language of the complaint.";

pub struct QueryNormalizer {
    llm: Arc<dyn ChatModel>,
    backoff: Duration,
}

impl QueryNormalizer {
    pub fn new(llm: Arc<dyn ChatModel>, backoff: Duration) -> Self { Self { llm, backoff } }

    /// The summary, or `raw` unchanged when the model cannot provide one.
    pub async fn normalize(&self, raw: &str) -> String {
        let started = Instant::now();
        let messages = [ChatMessage::system(NORMALIZE_INSTRUCTION), ChatMessage::user(raw)];
        match complete_with_retry(self.llm.as_ref(), &messages, self.backoff, "normalize").await {
            Ok(summary) if !summary.trim().is_empty() => {
                tracing::debug!(event = "pipeline.normalize.completed", elapsed_ms = started.elapsed().as_millis(), "query normalized");
                summary.trim().to_string()
            }
            Ok(_) => raw.to_string(),
            Err(error) => {
                tracing::warn!(event = "pipeline.normalize.failed", error = %error, "normalization failed; using raw query");
                raw.to_string()
            }
        }
    }
}
