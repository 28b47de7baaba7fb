mod support;

use std::collections::BTreeMap;

use dxrag_core::types::ScoredResult;
use dxrag_pipeline::assemble::{assemble_context, PROTOCOL_SEPARATOR};
use dxrag_pipeline::boost::{boost_exact_codes, HomoglyphTable};
use dxrag_pipeline::fusion::fuse;
use dxrag_pipeline::select::{rank_results, select_protocols};
use support::{hit, selected};

#[test]
fn fusion_keeps_max_score_and_first_seen_order() {
    let raw = vec![hit("a", "p1", 0.4, &[]), hit("b", "p2", 0.9, &[])];
    let normalized = vec![hit("c", "p3", 0.7, &[]), hit("a", "p1", 0.8, &[])];
    let fused = fuse(raw, normalized);
    let ids: Vec<&str> = fused.iter().map(ScoredResult::result_id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(fused[0].score(), 0.8);
    assert_eq!(fused[0].adjusted_score(), 0.8);
}

#[test]
fn fusion_is_order_independent_as_a_set() {
    let a = vec![hit("x", "p1", 0.3, &[]), hit("y", "p2", 0.6, &[])];
    let b = vec![hit("y", "p2", 0.5, &[]), hit("z", "p3", 0.2, &[]), hit("x", "p1", 0.35, &[])];
    let mut ab: Vec<(String, f32)> = fuse(a.clone(), b.clone()).iter().map(|r| (r.result_id().to_string(), r.score())).collect();
    let mut ba: Vec<(String, f32)> = fuse(b, a).iter().map(|r| (r.result_id().to_string(), r.score())).collect();
    ab.sort_by(|l, r| l.0.cmp(&r.0));
    ba.sort_by(|l, r| l.0.cmp(&r.0));
    assert_eq!(ab, ba);
    assert_eq!(ab.len(), 3);
}

#[test]
fn literal_code_in_query_outranks_identical_chunk() {
    let mut fused = fuse(vec![hit("plain", "p1", 0.9, &["G44"]), hit("coded", "p2", 0.9, &["G43.0"])], vec![]);
    let boosted = boost_exact_codes(&mut fused, "headache for two days, diagnosed g43.0 before", &HomoglyphTable::default(), 10.0, 3);
    assert_eq!(boosted, 1);
    let ranked = rank_results(fused);
    assert_eq!(ranked[0].result_id(), "coded");
    assert!(ranked[0].adjusted_score() - ranked[1].adjusted_score() >= 10.0);
}

#[test]
fn cyrillic_lookalike_codes_match_latin_query() {
    let mut fused = fuse(vec![hit("a", "p1", 0.1, &["К29.7"])], vec![]);
    assert_eq!(boost_exact_codes(&mut fused, "код K29.7", &HomoglyphTable::default(), 10.0, 3), 1);
    assert!((fused[0].adjusted_score() - 10.1).abs() < 1e-4);
}

#[test]
fn short_codes_never_match() {
    let mut fused = fuse(vec![hit("a", "p1", 0.5, &["I1", "A"])], vec![]);
    assert_eq!(boost_exact_codes(&mut fused, "i1 a something", &HomoglyphTable::default(), 10.0, 3), 0);
    assert_eq!(fused[0].adjusted_score(), fused[0].score());
}

#[test]
fn bonuses_accumulate_per_matching_code() {
    let mut fused = fuse(vec![hit("a", "p1", 0.5, &["J45.0", "J45", "J45", "E11"])], vec![]);
    boost_exact_codes(&mut fused, "asthma J45.0", &HomoglyphTable::default(), 10.0, 3);
    assert_eq!(fused[0].adjusted_score(), 30.5);
}

#[test]
fn boosting_is_monotone() {
    let mut fused = fuse(
        vec![hit("a", "p1", 0.2, &["R51"]), hit("b", "p2", 0.3, &["M54.5"]), hit("c", "p3", 0.1, &[])],
        vec![],
    );
    boost_exact_codes(&mut fused, "r51 headache", &HomoglyphTable::default(), 10.0, 3);
    for result in &fused {
        assert!(result.adjusted_score() >= result.score());
        let matched = result.result_id() == "a";
        assert_eq!(result.adjusted_score() > result.score(), matched);
    }
}

#[test]
fn configured_homoglyphs_take_part_in_matching() {
    let mut extra = BTreeMap::new();
    extra.insert("ԁ".to_string(), "D".to_string());
    let table = HomoglyphTable::with_overrides(&extra).unwrap();
    let mut fused = fuse(vec![hit("a", "p1", 0.0, &["ԁ50.0"])], vec![]);
    assert_eq!(boost_exact_codes(&mut fused, "anemia D50.0", &table, 10.0, 3), 1);
}

#[test]
fn selector_dedupes_protocols_and_respects_quota() {
    let results: Vec<_> = (0..12)
        .map(|i| hit(&format!("r{i}"), &format!("p{}", i % 7), 1.0 - i as f32 * 0.05, &[]))
        .collect();
    let selected = select_protocols(&rank_results(fuse(results, vec![])), 5);
    let ids: Vec<&str> = selected.iter().map(|s| s.protocol_id()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
}

#[test]
fn selector_keeps_best_chunk_per_protocol() {
    let ranked = rank_results(fuse(
        vec![hit("low", "p1", 0.2, &[]), hit("other", "p2", 0.5, &[]), hit("high", "p1", 0.9, &[])],
        vec![],
    ));
    let selected = select_protocols(&ranked, 5);
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].scored().result_id(), "high");
    assert_eq!(selected[1].protocol_id(), "p2");
}

#[test]
fn ties_keep_input_order() {
    let ranked = rank_results(fuse(
        vec![hit("first", "p1", 0.5, &[]), hit("second", "p2", 0.5, &[]), hit("third", "p3", 0.5, &[])],
        vec![],
    ));
    let ids: Vec<&str> = ranked.iter().map(ScoredResult::result_id).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[test]
fn nan_scores_sort_last() {
    let ranked = rank_results(fuse(vec![hit("nan", "p1", f32::NAN, &[]), hit("ok", "p2", 0.1, &[])], vec![]));
    assert_eq!(ranked[0].result_id(), "ok");
}

#[test]
fn selector_on_empty_input_is_empty() {
    assert!(select_protocols(&[], 5).is_empty());
}

#[test]
fn context_lists_codes_as_stored_and_truncates_content() {
    let long = selected("p1", "Гидроцефалия", &["G91.1", "G91", "G91.1"]);
    let other = selected("p2", "Migraine", &[]);
    let context = assemble_context(&[long, other], 5);
    let blocks: Vec<&str> = context.split(PROTOCOL_SEPARATOR).collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(
        blocks[0],
        "PROTOCOL: Гидроцефалия\nSECTION: complaints\nICD-10 CODES: G91.1, G91, G91.1\nCONTENT: Гидро"
    );
    assert!(blocks[1].contains("ICD-10 CODES: \n"));
}
