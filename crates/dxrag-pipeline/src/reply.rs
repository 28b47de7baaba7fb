//! Defensive parser for the generator's free-text reply.
//!
//! Grammar, in order of preference:
//! 1. the first balanced `{ ... }` span in the reply (braces inside JSON
//!    strings do not count);
//! 2. otherwise the body of a fenced block (three backticks, optional
//!    `json` tag).
//!
//! Field values are taken loosely (numbers as strings and the reverse) and
//! checked later by the generator.
use serde::Deserialize;
use serde_json::Value;

use crate::error::GenerationFailure;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReply {
    #[serde(default)]
    pub diagnoses: Option<Vec<RawDiagnosis>>,
    #[serde(default)]
    pub overall_confidence: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDiagnosis {
    #[serde(default)]
    pub rank: Option<Value>,
    #[serde(default)]
    pub icd_code: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub explanation: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
}

impl RawReply {
    /// The reply's error field, when it actually says something.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.trim().is_empty() => None,
            other => as_text(Some(other)).or_else(|| Some(other.to_string())),
        }
    }

    pub fn overall_confidence(&self) -> Option<f64> { as_number(self.overall_confidence.as_ref()) }
}

impl RawDiagnosis {
    pub fn rank(&self) -> Option<i64> { as_number(self.rank.as_ref()).map(|r| r.round() as i64) }
    pub fn icd_code(&self) -> Option<String> { as_text(self.icd_code.as_ref()) }
    pub fn name(&self) -> Option<String> { as_text(self.name.as_ref()) }
    pub fn explanation(&self) -> Option<String> { as_text(self.explanation.as_ref()) }
    pub fn confidence(&self) -> Option<f64> { as_number(self.confidence.as_ref()) }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Parse the generator reply into loosely typed fields.
pub fn parse_reply(reply: &str) -> Result<RawReply, GenerationFailure> {
    let body = extract_json_object(reply)
        .or_else(|| strip_code_fence(reply))
        .ok_or(GenerationFailure::NoJson)?;
    serde_json::from_str(body).map_err(|e| GenerationFailure::Parse(e.to_string()))
}

/// The first balanced brace span of `text`, if it closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The trimmed body of the first fenced block, if the reply has one.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    let body = match rest.find("```") {
        Some(close) => &rest[..close],
        None => rest,
    };
    let body = body.trim();
    (!body.is_empty()).then_some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_prose() {
        let reply = "Here you go: {\"diagnoses\": []} hope it helps";
        assert_eq!(extract_json_object(reply), Some("{\"diagnoses\": []}"));
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_object() {
        let reply = r#"{"diagnoses":[{"name":"odd } name","explanation":"a \" quote {"}]} trailing }"#;
        let body = extract_json_object(reply).unwrap();
        assert!(body.ends_with("]}"));
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.diagnoses.unwrap()[0].name().as_deref(), Some("odd } name"));
    }

    #[test]
    fn nested_objects_are_balanced() {
        let reply = "x {\"a\": {\"b\": {}}, \"c\": 1} y {\"d\": 2}";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": {}}, \"c\": 1}"));
    }

    #[test]
    fn unclosed_object_is_not_extracted() {
        assert_eq!(extract_json_object("{\"diagnoses\": ["), None);
        assert!(matches!(parse_reply("{\"diagnoses\": ["), Err(GenerationFailure::NoJson)));
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let reply = "```json\n{\"diagnoses\":[{\"rank\":1,\"icd_code\":null,\"name\":\"Migraine\"}]}\n```";
        let parsed = parse_reply(reply).unwrap();
        let diagnoses = parsed.diagnoses.unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].icd_code(), None);
        assert_eq!(diagnoses[0].rank(), Some(1));
    }

    #[test]
    fn fence_without_object_yields_parse_error() {
        assert!(matches!(parse_reply("```json\n[1, 2]\n```"), Err(GenerationFailure::Parse(_))));
    }

    #[test]
    fn plain_text_has_no_json() {
        assert_eq!(parse_reply("I cannot help with that.").unwrap_err(), GenerationFailure::NoJson);
        assert_eq!(parse_reply("").unwrap_err(), GenerationFailure::NoJson);
    }

    #[test]
    fn invalid_json_inside_braces_is_a_parse_error() {
        assert!(matches!(parse_reply("{diagnoses: nope}"), Err(GenerationFailure::Parse(_))));
    }

    #[test]
    fn wrongly_typed_diagnoses_field_is_a_parse_error() {
        assert!(matches!(parse_reply("{\"diagnoses\": \"G43.0\"}"), Err(GenerationFailure::Parse(_))));
    }

    #[test]
    fn loose_field_types_are_coerced() {
        let reply = r#"{"diagnoses":[{"rank":"2","icd_code":" K29.7 ","confidence":"0.8"}],"overall_confidence":"0.7"}"#;
        let parsed = parse_reply(reply).unwrap();
        let d = &parsed.diagnoses.as_ref().unwrap()[0];
        assert_eq!(d.rank(), Some(2));
        assert_eq!(d.icd_code().as_deref(), Some("K29.7"));
        assert_eq!(d.confidence(), Some(0.8));
        assert_eq!(parsed.overall_confidence(), Some(0.7));
    }

    #[test]
    fn error_field_reports_only_meaningful_values() {
        assert_eq!(parse_reply(r#"{"error": null}"#).unwrap().error_message(), None);
        assert_eq!(parse_reply(r#"{"error": false}"#).unwrap().error_message(), None);
        assert_eq!(parse_reply(r#"{"error": "quota"}"#).unwrap().error_message().as_deref(), Some("quota"));
        assert!(parse_reply(r#"{"error": {"code": 1}}"#).unwrap().error_message().is_some());
    }
}
