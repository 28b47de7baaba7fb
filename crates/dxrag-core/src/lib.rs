//! dxrag-core
//!
//! Domain types, the embedder seam, the error taxonomy, layered configuration
//! and the protocol-corpus processor shared by every other crate.
#![deny(dead_code)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;
