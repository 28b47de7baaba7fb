use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use dxrag_cli::server::serve;
use dxrag_cli::{build_pipeline, init_tracing, AppSettings};

#[derive(Parser)]
#[command(name = "dxrag-server")]
#[command(about = "HTTP diagnosis service: POST /diagnose, GET /health.")]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Listen address; overrides server.bind.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = AppSettings::load(&args.config)?;
    let pipeline = Arc::new(build_pipeline(&settings).await?);
    let bind = args.bind.unwrap_or_else(|| settings.server.bind.clone());
    serve(&bind, pipeline).await
}
