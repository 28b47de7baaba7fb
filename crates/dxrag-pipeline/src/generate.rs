//! Generative ranking over the assembled protocol context, with code repair.
use std::sync::Arc;
use std::time::{Duration, Instant};

use dxrag_core::types::{is_missing_code, Diagnosis, DiagnosisResponse, SelectedProtocol, UNKNOWN_CODE};
use dxrag_llm::{ChatMessage, ChatModel};

use crate::assemble::assemble_context;
use crate::error::GenerationFailure;
use crate::reply::{parse_reply, RawReply};
use crate::retry::complete_with_retry;

const GENERATOR_INSTRUCTION: &str = "You are an ICD-10 coding expert. Your main task is to return the correct diagnosis code.\n\
Rules:\n\
1. Put ONLY the code in \"icd_code\" (for example G91.1).\n\
2. Take the code from the supplied clinical protocols. If a protocol lists the code for the condition, use it.\n\
3. Never leave \"icd_code\" empty or null.\n\
4. Reply with a single JSON object and nothing else.";

const REPLY_FORMAT: &str = r#"Return a JSON object with the fields:
- diagnoses: the 3 most probable diagnoses, each with
  - rank: position from 1 to 3
  - icd_code: ICD-10 code
  - name: diagnosis name
  - explanation: short justification
  - confidence: confidence in this diagnosis, a number from 0.1 to 1.0
- overall_confidence: confidence in the whole answer, a number from 0.1 to 1.0
Answer STRICTLY as JSON:
{
  "diagnoses": [
    {"rank": 1, "icd_code": "G43.0", "name": "Migraine without aura", "explanation": "...", "confidence": 0.95}
  ],
  "overall_confidence": 0.9
}"#;

const DEFAULT_CONFIDENCE: f32 = 0.5;

pub struct DiagnosisGenerator {
    llm: Arc<dyn ChatModel>,
    context_chars: usize,
    max_diagnoses: usize,
    backoff: Duration,
}

impl DiagnosisGenerator {
    pub fn new(llm: Arc<dyn ChatModel>, context_chars: usize, max_diagnoses: usize, backoff: Duration) -> Self {
        Self { llm, context_chars, max_diagnoses: max_diagnoses.max(1), backoff }
    }

    pub fn messages(&self, query: &str, selected: &[SelectedProtocol]) -> Vec<ChatMessage> {
        let context = assemble_context(selected, self.context_chars);
        let user = format!(
            "Patient complaint: {query}\n\nUse this context from the clinical protocols:\n{context}\n\n{REPLY_FORMAT}"
        );
        vec![ChatMessage::system(GENERATOR_INSTRUCTION), ChatMessage::user(user)]
    }

    /// One model call, parsed and validated; any defect is a failure.
    pub async fn generate(&self, query: &str, selected: &[SelectedProtocol]) -> Result<DiagnosisResponse, GenerationFailure> {
        let started = Instant::now();
        let messages = self.messages(query, selected);
        let reply = complete_with_retry(self.llm.as_ref(), &messages, self.backoff, "generate").await?;
        let raw = parse_reply(&reply)?;
        let response = validate_and_repair(raw, selected, self.max_diagnoses)?;
        tracing::info!(
            event = "pipeline.generate.completed",
            diagnoses = response.diagnoses.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "diagnoses generated"
        );
        Ok(response)
    }
}

/// Turn a parsed reply into a response, filling missing codes from `selected`.
///
/// At most `max_diagnoses` entries are kept and renumbered 1..n. A missing
/// code for the entry of rank `r` comes from `selected[r - 1]`, clamped to
/// the last selected protocol.
pub fn validate_and_repair(
    raw: RawReply,
    selected: &[SelectedProtocol],
    max_diagnoses: usize,
) -> Result<DiagnosisResponse, GenerationFailure> {
    if let Some(message) = raw.error_message() {
        return Err(GenerationFailure::ErrorField(message));
    }
    let overall = raw.overall_confidence().map(clamp_confidence);
    let entries = raw.diagnoses.unwrap_or_default();
    if entries.is_empty() {
        return Err(GenerationFailure::EmptyDiagnoses);
    }

    let mut diagnoses = Vec::with_capacity(entries.len().min(max_diagnoses));
    for (position, entry) in entries.into_iter().take(max_diagnoses).enumerate() {
        let name = entry
            .name()
            .ok_or_else(|| GenerationFailure::Invalid(format!("diagnosis {} has no name", position + 1)))?;
        let slot = match entry.rank() {
            Some(rank) if rank >= 1 => usize::try_from(rank - 1).unwrap_or(usize::MAX),
            _ => position,
        };
        let code = entry.icd_code();
        let icd_code = if is_missing_code(code.as_deref()) {
            let repaired = repair_code(selected, slot);
            tracing::debug!(event = "pipeline.generate.code_repaired", position, code = %repaired, "filled missing code from protocol");
            repaired
        } else {
            code.unwrap_or_else(|| UNKNOWN_CODE.to_string())
        };
        diagnoses.push(Diagnosis {
            rank: u32::try_from(position + 1).unwrap_or(u32::MAX),
            icd_code,
            name,
            explanation: entry.explanation().unwrap_or_default(),
            confidence: entry.confidence().map(clamp_confidence).or(overall).unwrap_or(DEFAULT_CONFIDENCE),
        });
    }

    let overall_confidence = overall.or_else(|| {
        let sum: f32 = diagnoses.iter().map(|d| d.confidence).sum();
        Some(sum / diagnoses.len() as f32)
    });
    Ok(DiagnosisResponse { diagnoses, overall_confidence })
}

fn repair_code(selected: &[SelectedProtocol], slot: usize) -> String {
    match selected.len() {
        0 => UNKNOWN_CODE.to_string(),
        len => selected[slot.min(len - 1)].representative_code(),
    }
}

fn clamp_confidence(value: f64) -> f32 { value.clamp(0.0, 1.0) as f32 }
