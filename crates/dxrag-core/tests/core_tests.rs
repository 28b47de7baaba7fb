use std::fs;
use tempfile::TempDir;

use dxrag_core::config::{Config, DataSettings};
use dxrag_core::data_processor::DataProcessor;
use dxrag_core::types::{
    is_missing_code, ProtocolChunk, ScoredResult, SearchResult, SectionType, SelectedProtocol, UNKNOWN_CODE,
};

const LONG_TEXT: &str = "Пульсирующая головная боль средней или высокой интенсивности, усиливающаяся при физической нагрузке [12, 14-16].\nСопровождается тошнотой и светобоязнью.";

fn protocols_json() -> String {
    serde_json::json!([
        {
            "protocol_id": "p-migraine",
            "true_title": "Мигрень",
            "icd_codes": ["G43", "G43.0"],
            "sections": [
                { "type": "complaints", "content": LONG_TEXT },
                { "type": "definition", "content": "Коротко." }
            ]
        },
        {
            "protocol_id": "p-hydro",
            "icd_codes": [],
            "sections": [ { "type": "критерии диагностики", "content": LONG_TEXT } ]
        }
    ])
    .to_string()
}

fn selected(codes: &[&str]) -> SelectedProtocol {
    SelectedProtocol::new(ScoredResult::new(SearchResult {
        result_id: "r".to_string(),
        score: 0.5,
        payload: ProtocolChunk {
            protocol_id: "p".to_string(),
            title: "t".to_string(),
            section_type: SectionType::Other,
            content: String::new(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        },
    }))
}

#[test]
fn process_json_cleans_and_skips_short_sections() {
    let processor = DataProcessor::new().unwrap();
    let chunks = processor.process_json(&protocols_json()).expect("process");

    assert_eq!(chunks.len(), 2, "short definition section is dropped");
    let first = &chunks[0];
    assert_eq!(first.id, "p-migraine:0");
    assert_eq!(first.chunk.section_type, SectionType::Complaints);
    assert_eq!(first.chunk.codes, vec!["G43".to_string(), "G43.0".to_string()]);
    assert!(!first.chunk.content.contains('['), "citation markers removed");
    assert!(!first.chunk.content.contains('\n'), "newlines flattened");

    let second = &chunks[1];
    assert_eq!(second.chunk.title, "Unknown");
    assert_eq!(second.chunk.section_type, SectionType::Criteria);
    assert!(second.passage_body().starts_with("Protocol: Unknown. Section: criteria."));
}

#[test]
fn process_json_rejects_records_without_protocol_id() {
    let processor = DataProcessor::new().unwrap();
    let raw = r#"[{"title": "x", "sections": []}]"#;
    let err = processor.process_json(raw).unwrap_err();
    assert!(err.to_string().contains("protocol record 0"));
}

#[test]
fn long_sections_are_split_with_overlap() {
    let processor = DataProcessor::new().unwrap();
    let content: Vec<String> = (0..700).map(|i| format!("w{i}")).collect();
    let raw = serde_json::json!([{ "protocol_id": "p", "title": "T", "sections": [{ "type": "other", "content": content.join(" ") }] }]).to_string();
    let chunks = processor.process_json(&raw).expect("process");

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].chunk.content.starts_with("w0 "));
    assert!(chunks[1].chunk.content.starts_with("w240 "), "second window starts 60 words before the first ended");
    assert_eq!(chunks[2].id, "p:2");
}

#[test]
fn process_path_reads_a_directory_of_json_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.json"), protocols_json()).unwrap();
    fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    let processor = DataProcessor::new().unwrap();
    let chunks = processor.process_path(tmp.path()).expect("process dir");
    assert_eq!(chunks.len(), 2);
}

#[test]
fn representative_code_prefers_decimal_codes() {
    assert_eq!(selected(&["G91", "G91.1", "G91.8"]).representative_code(), "G91.1");
    assert_eq!(selected(&["G91", "G92"]).representative_code(), "G92");
    assert_eq!(selected(&[]).representative_code(), UNKNOWN_CODE);
}

#[test]
fn representative_code_skips_blank_entries() {
    assert_eq!(selected(&["G91", " "]).representative_code(), "G91");
    assert_eq!(selected(&["", " G43.0 ", "G43"]).representative_code(), "G43.0");
    assert_eq!(selected(&[" ", ""]).representative_code(), UNKNOWN_CODE);
}

#[test]
fn boosting_never_lowers_the_adjusted_score() {
    let mut scored = selected(&[]).scored().clone();
    scored.boost(-3.0);
    scored.boost(f32::NAN);
    assert_eq!(scored.adjusted_score(), scored.score());
    scored.boost(10.0);
    assert!((scored.adjusted_score() - 10.5).abs() < 1e-6);
}

#[test]
fn missing_code_markers() {
    assert!(is_missing_code(None));
    assert!(is_missing_code(Some("  ")));
    assert!(is_missing_code(Some("Unknown")));
    assert!(!is_missing_code(Some("G43.0")));
}

#[test]
fn config_sections_fall_back_to_defaults() {
    let config = Config::from_toml_str("[data]\ntable_name = \"custom\"\n");
    let data: DataSettings = config.section("data").expect("data section");
    assert_eq!(data.table_name, "custom");
    assert_eq!(data.lancedb_dir, DataSettings::default().lancedb_dir);

    let missing: DataSettings = config.section("nope").expect("defaults");
    assert_eq!(missing.table_name, "protocols");
}
