use dxrag_llm::LlmError;
use thiserror::Error;

/// Failures that end a request with an error instead of a diagnosis list.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("embedding call failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("vector index call failed: {0:#}")]
    Index(anyhow::Error),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

/// Why the generative step produced nothing usable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationFailure {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("reply contains no JSON object")]
    NoJson,

    #[error("reply JSON could not be parsed: {0}")]
    Parse(String),

    #[error("reply carries an error: {0}")]
    ErrorField(String),

    #[error("reply contains no diagnoses")]
    EmptyDiagnoses,

    #[error("reply failed validation: {0}")]
    Invalid(String),
}

/// Why the deterministic fallback answered instead of the generator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FallbackReason {
    #[error("no protocols were selected")]
    EmptySelection,

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationFailure),
}
