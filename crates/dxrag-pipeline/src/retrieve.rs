//! Two independent nearest-neighbour searches: raw query and normalized summary.
use std::sync::Arc;

use dxrag_core::traits::Embedder;
use dxrag_core::types::SearchResult;
use dxrag_embed::query_text;
use dxrag_vector::VectorIndex;

use crate::error::PipelineError;

/// Ranked hits of both searches, untouched.
#[derive(Debug, Clone)]
pub struct DualHits {
    pub raw: Vec<SearchResult>,
    pub normalized: Vec<SearchResult>,
}

pub struct DualRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    k: usize,
}

impl DualRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, k: usize) -> Self { Self { embedder, index, k } }

    pub async fn search(&self, raw: &str, normalized: &str) -> Result<DualHits, PipelineError> {
        let (raw_vec, normalized_vec) = self.embed_pair(raw, normalized).await?;
        let (raw_hits, normalized_hits) = futures::try_join!(
            self.index.search(&raw_vec, self.k),
            self.index.search(&normalized_vec, self.k),
        )
        .map_err(PipelineError::Index)?;
        tracing::debug!(event = "pipeline.retrieve.completed", raw = raw_hits.len(), normalized = normalized_hits.len(), k = self.k, "dual search finished");
        Ok(DualHits { raw: raw_hits, normalized: normalized_hits })
    }

    /// Model inference is CPU-bound; run it off the async workers.
    async fn embed_pair(&self, raw: &str, normalized: &str) -> Result<(Vec<f32>, Vec<f32>), PipelineError> {
        let embedder = Arc::clone(&self.embedder);
        let texts = vec![query_text(raw), query_text(normalized)];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| PipelineError::Embedding(anyhow::anyhow!("embedding task failed: {e}")))?
            .map_err(PipelineError::Embedding)?;
        if vectors.len() != 2 {
            return Err(PipelineError::Embedding(anyhow::anyhow!("expected 2 query vectors, got {}", vectors.len())));
        }
        let normalized_vec = vectors.pop().unwrap_or_default();
        let raw_vec = vectors.pop().unwrap_or_default();
        Ok((raw_vec, normalized_vec))
    }
}
