use dxrag_core::traits::Embedder;
use dxrag_core::types::EMBEDDING_DIM;
use dxrag_embed::{passage_text, query_text, FakeEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(EMBEDDING_DIM);
    let texts = vec!["головная боль тошнота".to_string(), "головная боль тошнота".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn embed_one_matches_batch() {
    let embedder = FakeEmbedder::new(EMBEDDING_DIM);
    let one = embedder.embed_one("мигрень").expect("embed_one");
    let batch = embedder.embed_batch(&["мигрень".to_string()]).expect("batch");
    assert_eq!(one, batch[0]);
}

#[test]
fn query_and_passage_markers_differ() {
    assert_eq!(query_text("боль"), "query: боль");
    assert_eq!(passage_text("боль"), "passage: боль");
}
