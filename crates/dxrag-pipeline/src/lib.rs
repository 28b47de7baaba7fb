//! dxrag-pipeline
//!
//! Complaint in, ranked diagnosis codes out. Retrieval runs two searches
//! (raw text and a model-written clinical summary), fuses them by best
//! score, boosts results whose codes the user typed verbatim and keeps the
//! best chunk per protocol. The model then ranks and explains diagnoses
//! over those protocols; if it cannot, a deterministic answer is built from
//! the protocols alone.
pub mod assemble;
pub mod boost;
pub mod error;
pub mod fallback;
pub mod fusion;
pub mod generate;
pub mod normalize;
pub mod pipeline;
pub mod reply;
pub mod retrieve;
mod retry;
pub mod select;
pub mod settings;

pub use error::{FallbackReason, GenerationFailure, PipelineError};
pub use pipeline::{DiagnosisPipeline, PipelineContext, PipelineOutcome, Retrieval};
pub use settings::PipelineSettings;
