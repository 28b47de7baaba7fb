use std::fs;

use dxrag_cli::eval::{load_cases, summarize, write_report, CaseResult, EvalMetrics, EvalReport};

fn result(gt: &str, pred: &[&str], latency: f64) -> CaseResult {
    CaseResult { file: "case.json".into(), gt: gt.into(), pred: pred.iter().map(|p| p.to_string()).collect(), latency, fallback: false }
}

#[test]
fn metrics_count_top1_and_top3_hits() {
    let results = vec![
        result("G43.0", &["G43.0", "G44"], 100.0),
        result("K29.7", &["K29.5", " K29.7 ", "K30"], 200.0),
        result("I10", &["I11", "I12", "I13"], 300.0),
        result("J45", &[], 400.0),
    ];
    let metrics = summarize(&results);
    assert_eq!(metrics.count, 4);
    assert_eq!(metrics.accuracy_at_1, 0.25);
    assert_eq!(metrics.recall_at_3, 0.5);
    assert_eq!(metrics.avg_latency, 250.0);
}

#[test]
fn no_results_gives_zero_metrics() {
    assert_eq!(summarize(&[]), EvalMetrics::default());
}

#[test]
fn cases_load_sorted_and_limited() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("b.json"), r#"{"query": "chest pain", "gt": "I20.0"}"#)?;
    fs::write(dir.path().join("a.json"), r#"{"query": "headache", "gt": "G43.0"}"#)?;
    fs::write(dir.path().join("notes.txt"), "ignored")?;
    let cases = load_cases(dir.path(), None)?;
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].file, "a.json");
    assert_eq!(cases[0].case.gt, "G43.0");
    assert_eq!(load_cases(dir.path(), Some(1))?.len(), 1);
    Ok(())
}

#[test]
fn malformed_case_names_the_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("broken.json"), r#"{"query": "no gt"}"#)?;
    let err = load_cases(dir.path(), None).unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
    Ok(())
}

#[test]
fn report_is_written_under_its_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let details = vec![result("G43.0", &["G43.0"], 12.5)];
    let report = EvalReport { name: "team".into(), generated_at: chrono::Utc::now(), metrics: summarize(&details), failed: 1, details };
    let path = write_report(&dir.path().join("evals"), &report)?;
    assert!(path.ends_with("team_results.json"));
    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(written["metrics"]["accuracy_at_1"], 1.0);
    assert_eq!(written["details"][0]["pred"][0], "G43.0");
    assert_eq!(written["failed"], 1);
    Ok(())
}
