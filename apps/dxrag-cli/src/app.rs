use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dxrag_core::config::{resolve_with_base, Config, DataSettings};
use dxrag_core::traits::Embedder;
use dxrag_embed::{get_default_embedder, EmbedSettings};
use dxrag_llm::{LlmClient, LlmSettings};
use dxrag_pipeline::{DiagnosisPipeline, PipelineContext, PipelineSettings};
use dxrag_vector::LanceProtocolIndex;
use tracing_subscriber::EnvFilter;

use crate::server::ServerSettings;

/// Every configuration section, with relative paths resolved against `base_dir`.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub data: DataSettings,
    pub embed: EmbedSettings,
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
    pub base_dir: PathBuf,
}

impl AppSettings {
    /// Load `config_path` (plus env layering); relative data paths resolve
    /// against the config file's directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = Config::load_from(config_path)?;
        let base_dir = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        Self::from_config(&config, base_dir)
    }

    pub fn from_config(config: &Config, base_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            data: config.section("data")?,
            embed: config.section("embed")?,
            llm: config.section("llm")?,
            pipeline: config.section("pipeline")?,
            server: config.section("server")?,
            base_dir,
        })
    }

    pub fn protocols_path(&self) -> PathBuf { resolve_with_base(&self.base_dir, &self.data.protocols_path) }
    pub fn lancedb_dir(&self) -> PathBuf { resolve_with_base(&self.base_dir, &self.data.lancedb_dir) }
    pub fn eval_dir(&self) -> PathBuf { resolve_with_base(&self.base_dir, &self.data.eval_dir) }
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.embed.model_dir.as_deref().map(|dir| resolve_with_base(&self.base_dir, dir))
    }

    pub fn lancedb_uri(&self) -> String { self.lancedb_dir().to_string_lossy().into_owned() }
}

/// Install the stderr subscriber; `RUST_LOG` overrides the `dxrag=info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dxrag=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn build_embedder(settings: &AppSettings) -> Result<Arc<dyn Embedder>> {
    let model_dir = settings.model_dir();
    let embedder = get_default_embedder(model_dir.as_deref(), settings.embed.max_len)?;
    Ok(Arc::from(embedder))
}

/// Connect the index, load the embedder and build the model client once.
pub async fn build_pipeline(settings: &AppSettings) -> Result<DiagnosisPipeline> {
    let embedder = build_embedder(settings)?;
    let index = LanceProtocolIndex::open(&settings.lancedb_uri(), &settings.data.table_name)
        .await
        .with_context(|| format!("opening index at {}", settings.lancedb_uri()))?;
    if settings.llm.api_key.is_none() {
        tracing::warn!("llm.api_key is not set; requests to the model endpoint will be unauthenticated");
    }
    let llm = LlmClient::new(&settings.llm)?;
    tracing::info!(model = %settings.llm.model, endpoint = llm.completions_url(), table = %settings.data.table_name, "pipeline ready");
    Ok(DiagnosisPipeline::new(PipelineContext {
        embedder,
        index: Arc::new(index),
        llm: Arc::new(llm),
        settings: settings.pipeline.clone(),
    })?)
}
