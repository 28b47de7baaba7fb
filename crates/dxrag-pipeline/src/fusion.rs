use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dxrag_core::types::{ScoredResult, SearchResult};

/// Merge two ranked lists by `result_id`, keeping the best score of each id.
///
/// Scores are combined by max, never summed. Output is in first-seen order:
/// `first` in its own order, then ids that only `second` contains.
pub fn fuse(first: Vec<SearchResult>, second: Vec<SearchResult>) -> Vec<ScoredResult> {
    let mut fused: Vec<SearchResult> = Vec::with_capacity(first.len() + second.len());
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for hit in first.into_iter().chain(second) {
        match by_id.entry(hit.result_id.clone()) {
            Entry::Occupied(slot) => {
                let kept = &mut fused[*slot.get()];
                if hit.score > kept.score { kept.score = hit.score; }
            }
            Entry::Vacant(slot) => {
                slot.insert(fused.len());
                fused.push(hit);
            }
        }
    }
    fused.into_iter().map(ScoredResult::new).collect()
}
