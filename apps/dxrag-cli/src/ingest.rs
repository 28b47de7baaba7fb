//! Corpus to index: process protocols, embed passages, write the table.
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

use dxrag_core::data_processor::{DataProcessor, IndexedChunk};
use dxrag_core::traits::Embedder;
use dxrag_embed::passage_text;
use dxrag_vector::ProtocolIndexWriter;

const EMBED_BATCH: usize = 32;

/// Embed every chunk as a passage, in order.
pub fn embed_passages(embedder: &dyn Embedder, chunks: &[IndexedChunk]) -> Result<Vec<Vec<f32>>> {
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages {msg}")?.progress_chars("#>-"));
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| passage_text(&c.passage_body())).collect();
        embeddings.extend(embedder.embed_batch(&texts)?);
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("embedded");
    Ok(embeddings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunks: usize,
    pub indexed: usize,
}

/// Process `protocols` and append the resulting chunks to the table behind `writer`.
pub async fn ingest(protocols: &Path, embedder: &dyn Embedder, writer: &ProtocolIndexWriter) -> Result<IngestSummary> {
    let started = Instant::now();
    let chunks = DataProcessor::new()?.process_path(protocols)?;
    if chunks.is_empty() {
        return Ok(IngestSummary { chunks: 0, indexed: 0 });
    }
    let embeddings = embed_passages(embedder, &chunks)?;
    let indexed = writer.index(&chunks, &embeddings).await?;
    tracing::info!(event = "ingest.completed", chunks = chunks.len(), indexed, elapsed_ms = started.elapsed().as_millis() as u64, "ingestion finished");
    Ok(IngestSummary { chunks: chunks.len(), indexed })
}
