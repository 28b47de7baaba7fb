use std::time::Duration;

use dxrag_llm::{ChatMessage, ChatModel, LlmError};

/// Call the model; on a rate-limit reply wait `backoff` and try exactly once more.
pub(crate) async fn complete_with_retry(
    llm: &dyn ChatModel,
    messages: &[ChatMessage],
    backoff: Duration,
    stage: &'static str,
) -> Result<String, LlmError> {
    match llm.complete(messages).await {
        Err(e) if e.is_rate_limited() => {
            tracing::warn!(event = "pipeline.llm.rate_limited", stage, backoff_ms = backoff.as_millis() as u64, "rate limited; retrying once");
            tokio::time::sleep(backoff).await;
            llm.complete(messages).await
        }
        other => other,
    }
}
