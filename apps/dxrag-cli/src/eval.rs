//! Offline evaluation over a directory of `{query, gt}` test cases.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use dxrag_pipeline::DiagnosisPipeline;

/// Codes compared for recall.
pub const RECALL_DEPTH: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub query: String,
    pub gt: String,
}

#[derive(Debug, Clone)]
pub struct LoadedCase {
    pub file: String,
    pub case: TestCase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResult {
    pub file: String,
    pub gt: String,
    pub pred: Vec<String>,
    pub latency: f64,
    pub fallback: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvalMetrics {
    pub accuracy_at_1: f64,
    pub recall_at_3: f64,
    pub avg_latency: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: EvalMetrics,
    pub failed: usize,
    pub details: Vec<CaseResult>,
}

/// Test cases from the `.json` files directly under `dir`, in file-name order.
pub fn load_cases(dir: &Path, limit: Option<usize>) -> Result<Vec<LoadedCase>> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    if let Some(limit) = limit { files.truncate(limit); }
    files
        .iter()
        .map(|path| {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let case: TestCase = serde_json::from_str(&raw).with_context(|| format!("parsing test case {}", path.display()))?;
            let file = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            Ok(LoadedCase { file, case })
        })
        .collect()
}

fn same_code(predicted: &str, expected: &str) -> bool { predicted.trim() == expected.trim() }

/// Accuracy@1, recall@3 and mean latency over the cases that completed.
pub fn summarize(results: &[CaseResult]) -> EvalMetrics {
    if results.is_empty() {
        return EvalMetrics::default();
    }
    let count = results.len();
    let hits_at_1 = results.iter().filter(|r| r.pred.first().is_some_and(|p| same_code(p, &r.gt))).count();
    let hits_at_3 = results
        .iter()
        .filter(|r| r.pred.iter().take(RECALL_DEPTH).any(|p| same_code(p, &r.gt)))
        .count();
    let total_latency: f64 = results.iter().map(|r| r.latency).sum();
    EvalMetrics {
        accuracy_at_1: hits_at_1 as f64 / count as f64,
        recall_at_3: hits_at_3 as f64 / count as f64,
        avg_latency: total_latency / count as f64,
        count,
    }
}

/// Run every case through the pipeline; failing cases are logged and skipped.
pub async fn run_cases(pipeline: &DiagnosisPipeline, cases: &[LoadedCase]) -> Result<(Vec<CaseResult>, usize)> {
    let pb = ProgressBar::new(cases.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cases {msg}")?.progress_chars("#>-"));
    let mut results = Vec::with_capacity(cases.len());
    let mut failed = 0usize;
    for loaded in cases {
        let started = Instant::now();
        match pipeline.diagnose(&loaded.case.query).await {
            Ok(outcome) => {
                let latency = started.elapsed().as_secs_f64() * 1000.0;
                let pred = outcome.response().diagnoses.iter().take(RECALL_DEPTH).map(|d| d.icd_code.clone()).collect();
                results.push(CaseResult {
                    file: loaded.file.clone(),
                    gt: loaded.case.gt.clone(),
                    pred,
                    latency: (latency * 100.0).round() / 100.0,
                    fallback: outcome.is_fallback(),
                });
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(event = "eval.case.failed", file = %loaded.file, error = %e, "case failed");
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok((results, failed))
}

/// Write `{name}_results.json` under `dir`, creating it if needed.
pub fn write_report(dir: &Path, report: &EvalReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}_results.json", report.name));
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}
