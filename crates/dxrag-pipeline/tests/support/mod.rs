#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dxrag_core::traits::Embedder;
use dxrag_core::types::{ProtocolChunk, ScoredResult, SearchResult, SectionType, SelectedProtocol};
use dxrag_embed::FakeEmbedder;
use dxrag_llm::{ChatMessage, ChatModel, LlmError};
use dxrag_pipeline::{DiagnosisPipeline, PipelineContext, PipelineSettings};
use dxrag_vector::VectorIndex;

pub const DIM: usize = 384;

pub fn chunk(protocol_id: &str, title: &str, codes: &[&str]) -> ProtocolChunk {
    ProtocolChunk {
        protocol_id: protocol_id.to_string(),
        title: title.to_string(),
        section_type: SectionType::Complaints,
        content: format!("{title} content"),
        codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn hit(id: &str, protocol_id: &str, score: f32, codes: &[&str]) -> SearchResult {
    SearchResult { result_id: id.to_string(), score, payload: chunk(protocol_id, &format!("Protocol {protocol_id}"), codes) }
}

pub fn selected(protocol_id: &str, title: &str, codes: &[&str]) -> SelectedProtocol {
    SelectedProtocol::new(ScoredResult::new(SearchResult {
        result_id: format!("{protocol_id}:0"),
        score: 0.8,
        payload: chunk(protocol_id, title, codes),
    }))
}

/// Chat model that replays queued replies and counts calls.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn last_user_message(&self) -> Option<String> {
        self.seen.lock().unwrap().last().and_then(|m| m.last()).map(|m| m.content.clone())
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Err(LlmError::Transport("script exhausted".into())))
    }
}

/// Index returning the same hits for every query.
pub struct FixedIndex(pub Vec<SearchResult>);

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn search(&self, _query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchResult>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn search(&self, _query_vec: &[f32], _k: usize) -> anyhow::Result<Vec<SearchResult>> {
        anyhow::bail!("connection refused")
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize { DIM }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { anyhow::bail!("model not loaded") }
}

/// Embedder whose inference thread dies mid-call.
pub struct PanickingEmbedder;

impl Embedder for PanickingEmbedder {
    fn dim(&self) -> usize { DIM }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { panic!("inference crashed") }
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings { rate_limit_backoff_ms: 0, ..PipelineSettings::default() }
}

pub fn pipeline_with(index: Arc<dyn VectorIndex>, llm: Arc<dyn ChatModel>) -> DiagnosisPipeline {
    DiagnosisPipeline::new(PipelineContext {
        embedder: Arc::new(FakeEmbedder::new(DIM)),
        index,
        llm,
        settings: test_settings(),
    })
    .unwrap()
}
