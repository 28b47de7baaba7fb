//! Request orchestration: normalize, dual search, fuse, boost, select, then
//! generate or fall back.
use std::sync::Arc;
use std::time::Instant;

use dxrag_core::traits::Embedder;
use dxrag_core::types::{DiagnosisResponse, ScoredResult, SearchResult, SelectedProtocol};
use dxrag_llm::ChatModel;
use dxrag_vector::VectorIndex;

use crate::boost::{boost_exact_codes, HomoglyphTable};
use crate::error::{FallbackReason, PipelineError};
use crate::fallback::synthesize_fallback;
use crate::fusion::fuse;
use crate::generate::DiagnosisGenerator;
use crate::normalize::QueryNormalizer;
use crate::retrieve::DualRetriever;
use crate::select::{rank_results, select_protocols};
use crate::settings::PipelineSettings;

/// Process-wide handles, built once at startup and shared by every request.
#[derive(Clone)]
pub struct PipelineContext {
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub llm: Arc<dyn ChatModel>,
    pub settings: PipelineSettings,
}

/// Everything retrieval produced for one query, before generation.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub query: String,
    pub normalized: String,
    pub raw_hits: Vec<SearchResult>,
    pub normalized_hits: Vec<SearchResult>,
    /// Fused and boosted results, best first.
    pub ranked: Vec<ScoredResult>,
    pub selected: Vec<SelectedProtocol>,
}

/// A response together with how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Generated(DiagnosisResponse),
    Fallback { response: DiagnosisResponse, reason: FallbackReason },
}

impl PipelineOutcome {
    pub fn response(&self) -> &DiagnosisResponse {
        match self {
            Self::Generated(response) | Self::Fallback { response, .. } => response,
        }
    }

    pub fn into_response(self) -> DiagnosisResponse {
        match self {
            Self::Generated(response) | Self::Fallback { response, .. } => response,
        }
    }

    pub fn is_fallback(&self) -> bool { matches!(self, Self::Fallback { .. }) }
}

pub struct DiagnosisPipeline {
    normalizer: QueryNormalizer,
    retriever: DualRetriever,
    generator: DiagnosisGenerator,
    homoglyphs: HomoglyphTable,
    settings: PipelineSettings,
}

impl DiagnosisPipeline {
    pub fn new(ctx: PipelineContext) -> Result<Self, PipelineError> {
        let PipelineContext { embedder, index, llm, settings } = ctx;
        if settings.search_k == 0 {
            return Err(PipelineError::Config("search_k must be at least 1".into()));
        }
        if settings.protocol_quota == 0 {
            return Err(PipelineError::Config("protocol_quota must be at least 1".into()));
        }
        let homoglyphs = HomoglyphTable::with_overrides(&settings.homoglyphs)?;
        let backoff = settings.rate_limit_backoff();
        Ok(Self {
            normalizer: QueryNormalizer::new(Arc::clone(&llm), backoff),
            retriever: DualRetriever::new(embedder, index, settings.search_k),
            generator: DiagnosisGenerator::new(llm, settings.context_chars, settings.max_diagnoses, backoff),
            homoglyphs,
            settings,
        })
    }

    pub fn settings(&self) -> &PipelineSettings { &self.settings }

    /// Run every stage up to and including protocol selection.
    pub async fn retrieve(&self, text: &str) -> Result<Retrieval, PipelineError> {
        let query = self.prepare_query(text)?;
        let normalized = self.normalizer.normalize(&query).await;
        let hits = self.retriever.search(&query, &normalized).await?;
        let mut fused = fuse(hits.raw.clone(), hits.normalized.clone());
        let boosted = boost_exact_codes(&mut fused, &query, &self.homoglyphs, self.settings.code_bonus, self.settings.min_code_len);
        let ranked = rank_results(fused);
        let selected = select_protocols(&ranked, self.settings.protocol_quota);
        tracing::info!(
            event = "pipeline.retrieval.completed",
            fused = ranked.len(),
            boosted,
            selected = ?selected.iter().map(|p| p.protocol_id()).collect::<Vec<_>>(),
            "retrieval finished"
        );
        Ok(Retrieval { query, normalized, raw_hits: hits.raw, normalized_hits: hits.normalized, ranked, selected })
    }

    /// Answer one complaint.
    ///
    /// Errors only when the query is empty or the embedder or index fails;
    /// every later failure yields the fallback response instead.
    pub async fn diagnose(&self, text: &str) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let retrieval = self.retrieve(text).await?;
        let generated = if retrieval.selected.is_empty() {
            Err(FallbackReason::EmptySelection)
        } else {
            self.generator.generate(&retrieval.query, &retrieval.selected).await.map_err(FallbackReason::from)
        };
        let outcome = match generated {
            Ok(response) => PipelineOutcome::Generated(response),
            Err(reason) => {
                tracing::warn!(event = "pipeline.fallback", reason = %reason, "using retrieval-only fallback");
                let response = synthesize_fallback(&retrieval.selected, self.settings.fallback_candidates, self.settings.fallback_confidence);
                PipelineOutcome::Fallback { response, reason }
            }
        };
        tracing::info!(
            event = "pipeline.diagnose.completed",
            fallback = outcome.is_fallback(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
        Ok(outcome)
    }

    fn prepare_query(&self, text: &str) -> Result<String, PipelineError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        Ok(trimmed.chars().take(self.settings.max_query_chars.max(1)).collect())
    }
}
