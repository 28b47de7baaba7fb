//! Exact-code boosting: a diagnostic code typed verbatim in the query
//! outranks any semantic similarity.
use std::collections::{BTreeMap, HashMap};

use dxrag_core::types::ScoredResult;

use crate::error::PipelineError;

/// Cyrillic letters that render like Latin ones in code strings.
const BUILTIN_HOMOGLYPHS: &[(char, char)] = &[
    ('А', 'A'),
    ('В', 'B'),
    ('Е', 'E'),
    ('К', 'K'),
    ('М', 'M'),
    ('Н', 'H'),
    ('О', 'O'),
    ('Р', 'P'),
    ('С', 'C'),
    ('Т', 'T'),
    ('Х', 'X'),
    ('У', 'Y'),
    ('І', 'I'),
    ('Ј', 'J'),
    ('Ѕ', 'S'),
];

/// Single-character substitutions applied after upper-casing.
#[derive(Debug, Clone)]
pub struct HomoglyphTable {
    map: HashMap<char, char>,
}

impl Default for HomoglyphTable {
    fn default() -> Self {
        Self { map: BUILTIN_HOMOGLYPHS.iter().copied().collect() }
    }
}

impl HomoglyphTable {
    /// Built-in table with `overrides` merged on top.
    ///
    /// Keys are upper-cased before insertion, so lower-case entries in the
    /// configuration still apply.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, PipelineError> {
        let mut table = Self::default();
        for (from, to) in overrides {
            let (Some(from_char), Some(to_char)) = (single_char(from), single_char(to)) else {
                return Err(PipelineError::Config(format!("homoglyph entry {from:?} -> {to:?} must map one character to one character")));
            };
            for upper in from_char.to_uppercase() {
                table.map.insert(upper, to_char);
            }
        }
        Ok(table)
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// Upper-case `text` and fold every homoglyph to its Latin form.
    pub fn normalize(&self, text: &str) -> String {
        text.chars()
            .flat_map(char::to_uppercase)
            .map(|c| self.map.get(&c).copied().unwrap_or(c))
            .collect()
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Add `bonus` to every result once per code entry found in `raw_query`.
///
/// Codes and query are both folded through `table`, so matching is
/// case-insensitive and immune to Cyrillic look-alikes. Codes shorter than
/// `min_len` characters after trimming never match. Returns the number of
/// results that received at least one bonus.
pub fn boost_exact_codes(
    results: &mut [ScoredResult],
    raw_query: &str,
    table: &HomoglyphTable,
    bonus: f32,
    min_len: usize,
) -> usize {
    let query = table.normalize(raw_query);
    let mut boosted = 0;
    for result in results.iter_mut() {
        let matches = result
            .payload()
            .codes
            .iter()
            .map(|code| table.normalize(code.trim()))
            .filter(|code| code.chars().count() >= min_len && query.contains(code.as_str()))
            .count();
        if matches > 0 {
            result.boost(bonus * matches as f32);
            boosted += 1;
        }
    }
    boosted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_cyrillic_lookalikes_and_case() {
        let table = HomoglyphTable::default();
        assert_eq!(table.normalize("g43.0"), "G43.0");
        assert_eq!(table.normalize("К29.7"), "K29.7");
        assert_eq!(table.normalize("с34"), "C34");
    }

    #[test]
    fn overrides_extend_the_table() {
        let mut extra = BTreeMap::new();
        extra.insert("ԁ".to_string(), "D".to_string());
        let table = HomoglyphTable::with_overrides(&extra).unwrap();
        assert_eq!(table.len(), BUILTIN_HOMOGLYPHS.len() + 1);
        assert_eq!(table.normalize("ԁ50"), "D50");
    }

    #[test]
    fn multi_character_override_is_rejected() {
        let mut extra = BTreeMap::new();
        extra.insert("AB".to_string(), "C".to_string());
        assert!(matches!(HomoglyphTable::with_overrides(&extra), Err(PipelineError::Config(_))));
    }
}
