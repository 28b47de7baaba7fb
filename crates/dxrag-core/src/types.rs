//! Domain types shared by the index, the pipeline and the application layer.

use serde::{Deserialize, Serialize};

pub type ResultId = String;

/// Dimensionality of every vector stored in or queried against the index.
pub const EMBEDDING_DIM: usize = 384;

/// Code value used when no diagnostic code could be observed for a diagnosis.
pub const UNKNOWN_CODE: &str = "unknown";

/// Which part of a clinical protocol a chunk was cut from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Complaints,
    Criteria,
    Definition,
    Other,
}

impl SectionType {
    /// Map a free-form section label from the corpus onto a section type.
    ///
    /// Accepts the canonical English labels as well as the Russian headings
    /// used by the protocol corpus; anything unrecognised is `Other`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.starts_with("complaint") || label.starts_with("жалоб") {
            Self::Complaints
        } else if label.contains("criteria") || label.starts_with("критери") || label.contains("диагностическ") {
            Self::Criteria
        } else if label.starts_with("definition") || label.starts_with("определени") {
            Self::Definition
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complaints => "complaints",
            Self::Criteria => "criteria",
            Self::Definition => "definition",
            Self::Other => "other",
        }
    }
}

/// A bounded section of a clinical protocol; the unit stored in the index.
///
/// - `protocol_id`: identity of the parent protocol (one protocol, many chunks)
/// - `codes`: diagnostic codes in extraction order, duplicates allowed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolChunk {
    pub protocol_id: String,
    pub title: String,
    pub section_type: SectionType,
    pub content: String,
    pub codes: Vec<String>,
}

/// One nearest-neighbour hit returned by a vector index. Higher score is better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub result_id: ResultId,
    pub score: f32,
    pub payload: ProtocolChunk,
}

/// A search result carrying the per-request adjusted score.
///
/// `adjusted_score` starts at `score` and only ever grows.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    result: SearchResult,
    adjusted_score: f32,
}

impl ScoredResult {
    pub fn new(result: SearchResult) -> Self {
        let adjusted_score = result.score;
        Self { result, adjusted_score }
    }

    pub fn result_id(&self) -> &str { &self.result.result_id }
    pub fn score(&self) -> f32 { self.result.score }
    pub fn adjusted_score(&self) -> f32 { self.adjusted_score }
    pub fn payload(&self) -> &ProtocolChunk { &self.result.payload }

    /// Add a non-negative bonus. Negative or NaN bonuses are ignored.
    pub fn boost(&mut self, bonus: f32) {
        if bonus > 0.0 {
            self.adjusted_score += bonus;
        }
    }
}

/// The highest-scoring chunk of a protocol, chosen to represent it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedProtocol {
    scored: ScoredResult,
}

impl SelectedProtocol {
    pub fn new(scored: ScoredResult) -> Self { Self { scored } }
    pub fn protocol_id(&self) -> &str { &self.scored.payload().protocol_id }
    pub fn title(&self) -> &str { &self.scored.payload().title }
    pub fn section_type(&self) -> SectionType { self.scored.payload().section_type }
    pub fn content(&self) -> &str { &self.scored.payload().content }
    pub fn codes(&self) -> &[String] { &self.scored.payload().codes }
    pub fn adjusted_score(&self) -> f32 { self.scored.adjusted_score() }
    pub fn scored(&self) -> &ScoredResult { &self.scored }

    /// Pick the code that best represents this protocol.
    ///
    /// Blank entries are ignored. The first code containing a decimal point
    /// wins; otherwise the last code in the list; with no codes at all,
    /// [`UNKNOWN_CODE`].
    pub fn representative_code(&self) -> String {
        let usable = || self.codes().iter().map(|c| c.trim()).filter(|c| !c.is_empty());
        usable()
            .find(|c| c.contains('.'))
            .or_else(|| usable().last())
            .map_or_else(|| UNKNOWN_CODE.to_string(), str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub rank: u32,
    pub icd_code: String,
    pub name: String,
    pub explanation: String,
    pub confidence: f32,
}

/// The shape returned to callers, both on the generated and the fallback path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisResponse {
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_confidence: Option<f32>,
}

/// True when `code` is missing in substance: empty or the unknown marker.
pub fn is_missing_code(code: Option<&str>) -> bool {
    match code.map(str::trim) {
        None => true,
        Some(c) => c.is_empty() || c.eq_ignore_ascii_case(UNKNOWN_CODE) || c.eq_ignore_ascii_case("null"),
    }
}
