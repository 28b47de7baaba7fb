//! dxrag-embed
//!
//! Sentence embeddings for protocol passages and patient queries.
//!
//! The production encoder is multilingual E5-small (a BERT model, 384-d) run
//! on candle with masked-mean pooling and L2 normalization. E5 is trained
//! asymmetrically: queries and passages must carry different markers, see
//! [`query_text`] and [`passage_text`]. `APP_USE_FAKE_EMBEDDINGS=1` swaps in
//! a deterministic hash embedder for tests and development.
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use dxrag_core::traits::Embedder;
use dxrag_core::types::EMBEDDING_DIM;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

pub const QUERY_PREFIX: &str = "query: ";
pub const PASSAGE_PREFIX: &str = "passage: ";
pub const DEFAULT_MAX_LEN: usize = 512;

/// Mark `text` as a retrieval query.
pub fn query_text(text: &str) -> String { format!("{QUERY_PREFIX}{text}") }

/// Mark `text` as an indexed passage.
pub fn passage_text(text: &str) -> String { format!("{PASSAGE_PREFIX}{text}") }

/// `[embed]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    /// Directory holding the E5 model files; see [`resolve_model_dir`].
    pub model_dir: Option<String>,
    /// Token budget per text; longer inputs are truncated.
    pub max_len: usize,
}

impl Default for EmbedSettings {
    fn default() -> Self { Self { model_dir: None, max_len: DEFAULT_MAX_LEN } }
}

pub struct E5Embedder { model: BertModel, tokenizer: Tokenizer, device: Device, max_len: usize }

impl E5Embedder {
    /// Load `config.json`, `tokenizer.json` and the weights from `model_dir`.
    ///
    /// `model.safetensors` is preferred; `pytorch_model.bin` is accepted.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(model_dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!(hidden_size = config.hidden_size, "embedding model loaded");
        Ok(Self { model, tokenizer, device, max_len })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != EMBEDDING_DIM {
            return Err(anyhow!("embedding has dimension {}, expected {}", emb.len(), EMBEDDING_DIM));
        }
        let elapsed_ms = start.elapsed().as_millis();
        if elapsed_ms > 100 { tracing::debug!(elapsed_ms, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for E5Embedder {
    fn dim(&self) -> usize { EMBEDDING_DIM }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Deterministic token-hash embedder; same text, same unit vector.
pub struct FakeEmbedder { dim: usize }
impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim } } }
impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { DEFAULT_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        Ok(texts.iter().map(|text| {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.to_lowercase().hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
        }).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// The embedder selected by the environment: fake when requested, E5 otherwise.
pub fn get_default_embedder(configured_dir: Option<&Path>, max_len: usize) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() { tracing::info!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(EMBEDDING_DIM))); }
    let dir = resolve_model_dir(configured_dir)?;
    Ok(Box::new(E5Embedder::load(&dir, max_len)?))
}

pub fn resolve_model_dir(configured_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured_dir { if p.exists() { return Ok(p.to_path_buf()); } tracing::warn!(path = %p.display(), "configured model dir does not exist"); }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { tracing::info!(var, path = %p.display(), "using model dir from env"); return Ok(p); } }
    }
    let default = Path::new("models/multilingual-e5-small"); if default.exists() { return Ok(default.to_path_buf()); }
    Err(anyhow!("Could not locate multilingual-e5-small model directory"))
}
