//! dxrag-vector
//!
//! The vector index seam and its implementations: a LanceDB table of
//! protocol chunks (384-d, cosine) and a brute-force in-memory index.
use anyhow::Result;
use async_trait::async_trait;

use dxrag_core::types::SearchResult;

pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::InMemoryIndex;
pub use search::LanceProtocolIndex;
pub use writer::ProtocolIndexWriter;

/// Nearest-neighbour search over stored protocol chunks.
///
/// Results come back best-first, at most `k` of them, with payloads already
/// validated.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchResult>>;
}
