//! Protocol corpus processing: JSON protocol records in, index-ready chunks out.
//!
//! Section text is cleaned of citation markers and whitespace noise, short
//! sections are dropped and long ones are split into overlapping windows.
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::{ProtocolChunk, SectionType};

/// A chunk ready for embedding and indexing.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: String,
    pub chunk: ProtocolChunk,
}

impl IndexedChunk {
    /// Text handed to the embedder for this chunk, without the passage marker.
    pub fn passage_body(&self) -> String {
        format!(
            "Protocol: {}. Section: {}. Content: {}",
            self.chunk.title,
            self.chunk.section_type.as_str(),
            self.chunk.content
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawProtocol {
    protocol_id: Option<String>,
    #[serde(alias = "true_title")]
    title: Option<String>,
    #[serde(default)]
    icd_codes: Vec<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSection {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub min_chars: usize,
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { min_chars: 50, max_words: 300, overlap_percent: 0.2 }
    }
}

pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    citations: Regex,
    whitespace: Regex,
}

impl DataProcessor {
    pub fn new() -> Result<Self> {
        Self::with_config(ChunkingConfig::default())
    }

    pub fn with_config(chunking_config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunking_config,
            citations: Regex::new(r"\[\d+[\d\s,\-]*\]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Process a single protocols file, or every `.json` file under a directory.
    pub fn process_path(&self, path: &Path) -> Result<Vec<IndexedChunk>> {
        let files = if path.is_dir() { self.list_json_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            tracing::warn!(path = %path.display(), "no protocol files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!(file = %file_path.display(), "processing protocols file {}/{}", file_index + 1, files.len());
            let raw = fs::read_to_string(file_path).with_context(|| format!("reading {}", file_path.display()))?;
            all_chunks.extend(self.process_json(&raw)?);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "corpus processed");
        Ok(all_chunks)
    }

    /// Process a JSON array of protocol records.
    pub fn process_json(&self, raw: &str) -> Result<Vec<IndexedChunk>> {
        let protocols: Vec<RawProtocol> = serde_json::from_str(raw).context("parsing protocols JSON")?;
        let mut chunks = Vec::new();
        for (record_index, protocol) in protocols.into_iter().enumerate() {
            let protocol_id = protocol
                .protocol_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| Error::InvalidConfig(format!("protocol record {record_index} has no protocol_id")))?
                .to_string();
            let title = protocol.title.clone().filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "Unknown".to_string());
            let mut chunk_index = 0usize;
            for section in &protocol.sections {
                let content = self.clean_text(&section.content);
                if content.chars().count() < self.chunking_config.min_chars {
                    continue;
                }
                let section_type = section.kind.as_deref().map_or(SectionType::Other, SectionType::from_label);
                for window in self.split_with_overlap(&content) {
                    chunks.push(IndexedChunk {
                        id: format!("{}:{}", protocol_id, chunk_index),
                        chunk: ProtocolChunk {
                            protocol_id: protocol_id.clone(),
                            title: title.clone(),
                            section_type,
                            content: window,
                            codes: protocol.icd_codes.clone(),
                        },
                    });
                    chunk_index += 1;
                }
            }
        }
        Ok(chunks)
    }

    /// Strip bracketed citation markers, flatten newlines and collapse whitespace.
    pub fn clean_text(&self, text: &str) -> String {
        let text = self.citations.replace_all(text, "");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }

    fn split_with_overlap(&self, content: &str) -> Vec<String> {
        let words: Vec<&str> = content.split_whitespace().collect();
        let words_per_chunk = self.chunking_config.max_words.max(1);
        if words.len() <= words_per_chunk {
            return vec![content.to_string()];
        }
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_json_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        json_files.sort();
        json_files
    }
}
