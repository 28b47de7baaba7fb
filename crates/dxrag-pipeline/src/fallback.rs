use dxrag_core::types::{Diagnosis, DiagnosisResponse, SelectedProtocol, UNKNOWN_CODE};

pub const FALLBACK_EXPLANATION: &str =
    "Matched by semantic retrieval over clinical protocols; generative ranking was unavailable.";
pub const NO_MATCH_NAME: &str = "Error";
pub const NO_MATCH_EXPLANATION: &str = "No clinical protocol matched the query.";

/// Deterministic answer built from the top `candidates` protocols alone.
///
/// With nothing selected the answer is a single `"Error"` diagnosis with the
/// unknown code. `overall_confidence` is always `confidence`.
pub fn synthesize_fallback(selected: &[SelectedProtocol], candidates: usize, confidence: f32) -> DiagnosisResponse {
    let confidence = confidence.clamp(0.0, 1.0);
    let diagnoses = if selected.is_empty() {
        vec![Diagnosis {
            rank: 1,
            icd_code: UNKNOWN_CODE.to_string(),
            name: NO_MATCH_NAME.to_string(),
            explanation: NO_MATCH_EXPLANATION.to_string(),
            confidence: 0.0,
        }]
    } else {
        selected
            .iter()
            .take(candidates.max(1))
            .enumerate()
            .map(|(position, protocol)| Diagnosis {
                rank: u32::try_from(position + 1).unwrap_or(u32::MAX),
                icd_code: protocol.representative_code(),
                name: protocol.title().to_string(),
                explanation: FALLBACK_EXPLANATION.to_string(),
                confidence,
            })
            .collect()
    };
    DiagnosisResponse { diagnoses, overall_confidence: Some(confidence) }
}
