use dxrag_core::traits::Embedder;
use dxrag_embed::{get_default_embedder, query_text, DEFAULT_MAX_LEN};

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(None, DEFAULT_MAX_LEN)?;
    let texts = vec![query_text("сильная головная боль, тошнота"), query_text("кашель и температура")];
    let embs = embedder.embed_batch(&texts)?;
    let cosine: f32 = embs[0].iter().zip(&embs[1]).map(|(a, b)| a * b).sum();
    println!("B={} dim={} cosine={:.4}", embs.len(), embedder.dim(), cosine);
    Ok(())
}
