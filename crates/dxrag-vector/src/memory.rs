//! Brute-force in-memory index with the same contract as the LanceDB table.
use anyhow::Result;
use async_trait::async_trait;

use dxrag_core::error::Error;
use dxrag_core::types::{ProtocolChunk, SearchResult};

use crate::VectorIndex;

pub struct InMemoryIndex {
    dim: usize,
    entries: Vec<(String, ProtocolChunk, Vec<f32>)>,
}

impl InMemoryIndex {
    pub fn new(dim: usize) -> Self { Self { dim, entries: Vec::new() } }

    pub fn insert(&mut self, id: impl Into<String>, chunk: ProtocolChunk, vector: Vec<f32>) -> Result<()> {
        let id = id.into();
        if vector.len() != self.dim {
            return Err(Error::MalformedPayload { result_id: id, reason: format!("vector has dimension {}, expected {}", vector.len(), self.dim) }.into());
        }
        self.entries.push((id, chunk, vector));
        Ok(())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query_vec.len() != self.dim {
            return Err(Error::Operation(format!("query vector has dimension {}, expected {}", query_vec.len(), self.dim)).into());
        }
        let mut hits: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|(id, chunk, v)| SearchResult { result_id: id.clone(), score: cosine(query_vec, v), payload: chunk.clone() })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}
