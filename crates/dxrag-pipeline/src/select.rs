use std::collections::HashSet;

use dxrag_core::types::{ScoredResult, SelectedProtocol};

/// Sort best-first by adjusted score, keeping input order among ties.
/// A NaN score sorts last.
pub fn rank_results(mut results: Vec<ScoredResult>) -> Vec<ScoredResult> {
    results.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));
    results
}

fn sort_key(result: &ScoredResult) -> f32 {
    let score = result.adjusted_score();
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

/// Keep the best chunk of each protocol until `quota` protocols are chosen.
///
/// `ranked` must already be sorted (see [`rank_results`]).
pub fn select_protocols(ranked: &[ScoredResult], quota: usize) -> Vec<SelectedProtocol> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut selected = Vec::with_capacity(quota.min(ranked.len()));
    for result in ranked {
        if selected.len() >= quota { break; }
        if seen.insert(result.payload().protocol_id.as_str()) {
            selected.push(SelectedProtocol::new(result.clone()));
        }
    }
    selected
}
