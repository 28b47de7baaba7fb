//! dxrag-cli
//!
//! Wiring shared by the `dxrag` command line and the `dxrag-server` HTTP
//! service: settings, process-wide clients, ingestion, evaluation and the
//! HTTP router.
pub mod app;
pub mod eval;
pub mod ingest;
pub mod server;

pub use app::{build_embedder, build_pipeline, init_tracing, AppSettings};
