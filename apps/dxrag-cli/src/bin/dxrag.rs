use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use dxrag_cli::eval::{load_cases, run_cases, summarize, write_report, EvalReport};
use dxrag_cli::ingest::ingest;
use dxrag_cli::{build_embedder, build_pipeline, init_tracing, AppSettings};
use dxrag_vector::table::{open_db, row_count, sample};
use dxrag_vector::ProtocolIndexWriter;

/// Chunks inspected by `search --expect`.
const EXPECT_DEPTH: usize = 10;

#[derive(Parser)]
#[command(name = "dxrag")]
#[command(about = "Complaint to ICD-10 diagnosis over an index of clinical protocols.")]
struct Cli {
    /// Configuration file; `config.<RUST_ENV>.toml` next to it and `APP_*` variables are layered on top.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process the protocol corpus, embed passages and write the index.
    Ingest {
        /// Protocols JSON file or directory (default: data.protocols_path)
        #[arg(long)]
        protocols: Option<PathBuf>,
        /// Delete the existing index first.
        #[arg(long)]
        reset: bool,
    },
    /// Run the full pipeline on one complaint and print the JSON response.
    Diagnose { text: String },
    /// Retrieval only: normalized query, fused scores and selected protocols.
    Search {
        text: String,
        /// Report whether this code appears among the top results.
        #[arg(long)]
        expect: Option<String>,
    },
    /// Row count and a few stored chunks.
    Stats {
        #[arg(long, default_value_t = 3)]
        sample: usize,
    },
    /// Accuracy@1 / recall@3 / latency over a directory of `{query, gt}` cases.
    Eval {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "dxrag")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = AppSettings::load(&cli.config).map_err(|e| { eprintln!("Error loading config: {e:#}"); e })?;

    match cli.command {
        Command::Ingest { protocols, reset } => {
            let protocols = protocols.unwrap_or_else(|| settings.protocols_path());
            let lancedb_dir = settings.lancedb_dir();
            println!("Protocol ingest\n===============");
            println!("Protocols: {}", protocols.display());
            println!("Index: {} (table {})", lancedb_dir.display(), settings.data.table_name);
            if reset && lancedb_dir.exists() {
                println!("⚠️  Removing existing index (--reset)");
                fs::remove_dir_all(&lancedb_dir)?;
            }
            fs::create_dir_all(&lancedb_dir)?;
            let embedder = build_embedder(&settings)?;
            let writer = ProtocolIndexWriter::open(&settings.lancedb_uri(), &settings.data.table_name).await?;
            let summary = ingest(&protocols, embedder.as_ref(), &writer).await?;
            println!("\n✅ Ingest complete: {} chunks, {} indexed", summary.chunks, summary.indexed);
        }
        Command::Diagnose { text } => {
            let pipeline = build_pipeline(&settings).await?;
            let outcome = pipeline.diagnose(&text).await?;
            if let dxrag_pipeline::PipelineOutcome::Fallback { reason, .. } = &outcome {
                eprintln!("⚠️  fallback answer: {reason}");
            }
            println!("{}", serde_json::to_string_pretty(outcome.response())?);
        }
        Command::Search { text, expect } => {
            let pipeline = build_pipeline(&settings).await?;
            let retrieval = pipeline.retrieve(&text).await?;
            println!("Query: {}", retrieval.query);
            println!("Normalized: {}", retrieval.normalized);
            println!("Hits: raw={} normalized={} fused={}", retrieval.raw_hits.len(), retrieval.normalized_hits.len(), retrieval.ranked.len());
            println!("\nTop {EXPECT_DEPTH} chunks:");
            let mut found_in_top = false;
            for (i, result) in retrieval.ranked.iter().take(EXPECT_DEPTH).enumerate() {
                let payload = result.payload();
                let is_hit = expect.as_deref().is_some_and(|code| payload.codes.iter().any(|c| c.trim() == code.trim()));
                found_in_top |= is_hit;
                let marker = if is_hit { "✅" } else { "  " };
                println!(
                    "{:>2}. {marker} score={:.4} adjusted={:.4} | {} | {} | codes: {}",
                    i + 1,
                    result.score(),
                    result.adjusted_score(),
                    payload.title,
                    payload.section_type.as_str(),
                    payload.codes.join(", ")
                );
            }
            println!("\nSelected protocols:");
            for (i, protocol) in retrieval.selected.iter().enumerate() {
                println!("{:>2}. [{:.4}] {} -> {}", i + 1, protocol.adjusted_score(), protocol.title(), protocol.representative_code());
            }
            if let Some(code) = expect {
                let selected_hit = retrieval.selected.iter().any(|p| p.codes().iter().any(|c| c.trim() == code.trim()));
                if !found_in_top {
                    println!("\n🆘 {code} is not among the top {EXPECT_DEPTH} chunks: retrieval or indexing problem.");
                } else if !selected_hit {
                    println!("\n⚠️  {code} is retrieved but its protocol was not selected.");
                } else {
                    println!("\n✅ {code} is retrieved and selected; any miss is in generation.");
                }
            }
        }
        Command::Stats { sample: limit } => {
            let db = open_db(&settings.lancedb_uri()).await?;
            let table = &settings.data.table_name;
            println!("Index: {} (table {table})", settings.lancedb_uri());
            println!("📊 Stored chunks: {}", row_count(&db, table).await?);
            for result in sample(&db, table, limit).await? {
                let payload = &result.payload;
                let preview: String = payload.content.chars().take(200).collect();
                println!("\nID: {}\nTitle: {}\nCodes: {}\nSection: {}\nContent: {preview}...", result.result_id, payload.title, payload.codes.join(", "), payload.section_type.as_str());
            }
        }
        Command::Eval { data_dir, limit, name } => {
            let cases = load_cases(&data_dir, limit)?;
            if cases.is_empty() {
                eprintln!("❌ No JSON test cases found in {}", data_dir.display());
                return Ok(());
            }
            let pipeline = build_pipeline(&settings).await?;
            println!("🚀 Evaluating {} cases as {name}", cases.len());
            let (details, failed) = run_cases(&pipeline, &cases).await?;
            let metrics = summarize(&details);
            println!("\n==============================");
            println!("✅ Accuracy@1: {:.4}", metrics.accuracy_at_1);
            println!("🎯 Recall@3:   {:.4}", metrics.recall_at_3);
            println!("⚡ Avg Latency: {:.2} ms", metrics.avg_latency);
            if failed > 0 { println!("❌ Failed cases: {failed}"); }
            println!("==============================");
            let report = EvalReport { name, generated_at: chrono::Utc::now(), metrics, failed, details };
            let path = write_report(&settings.eval_dir(), &report)?;
            println!("📄 Report written to {}", path.display());
        }
    }
    Ok(())
}
