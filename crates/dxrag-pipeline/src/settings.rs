use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// `[pipeline]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Results requested from each of the two searches.
    pub search_k: usize,
    /// Maximum number of distinct protocols kept by the selector.
    pub protocol_quota: usize,
    /// Score added per code typed verbatim in the query.
    pub code_bonus: f32,
    /// Codes shorter than this never match.
    pub min_code_len: usize,
    /// Per-protocol content budget in the generator context, in characters.
    pub context_chars: usize,
    pub max_diagnoses: usize,
    pub fallback_candidates: usize,
    pub fallback_confidence: f32,
    pub rate_limit_backoff_ms: u64,
    pub max_query_chars: usize,
    /// Extra single-character substitutions merged over the built-in homoglyph table.
    pub homoglyphs: BTreeMap<String, String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_k: 30,
            protocol_quota: 5,
            code_bonus: 10.0,
            min_code_len: 3,
            context_chars: 1500,
            max_diagnoses: 3,
            fallback_candidates: 3,
            fallback_confidence: 0.5,
            rate_limit_backoff_ms: 2000,
            max_query_chars: 4000,
            homoglyphs: BTreeMap::new(),
        }
    }
}

impl PipelineSettings {
    pub fn rate_limit_backoff(&self) -> Duration { Duration::from_millis(self.rate_limit_backoff_ms) }
}
