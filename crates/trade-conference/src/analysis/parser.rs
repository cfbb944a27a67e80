//! Defensive parsing of the AI service's semi-structured output
//!
//! The model is asked for one JSON object but routinely wraps it in
//! markdown fences or prose. [`parse`] tries a fixed sequence of candidate
//! substrings and validates the first one that decodes.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::types::{AnalysisResult, Finding, FindingKind, LineItem, Verdict};

/// Outcome of parsing one AI response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Success(AnalysisResult),
    /// Human-readable reason the response was rejected
    Failure(String),
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_))
    }

    /// Unwrap into a result, mapping a failure to the canonical error result
    pub fn into_result(self) -> AnalysisResult {
        match self {
            ParseOutcome::Success(result) => result,
            ParseOutcome::Failure(reason) => AnalysisResult::failure(
                "parsing",
                format!("Could not parse AI response: {}", reason),
            ),
        }
    }
}

/// Fence patterns: an explicit ```json block first, then any fenced block
fn fence_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [r"(?s)```json\s*(.*?)```", r"(?s)```[a-zA-Z]*\s*(.*?)```"]
            .into_iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Candidate JSON substrings, most specific first
fn candidates(raw: &str) -> Vec<&str> {
    let mut found = Vec::with_capacity(4);

    for re in fence_patterns() {
        if let Some(body) = re.captures(raw).and_then(|c| c.get(1)) {
            found.push(body.as_str().trim());
        }
    }

    found.push(raw.trim());

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            found.push(&raw[start..=end]);
        }
    }

    found.dedup();
    found
}

/// Parse a raw AI response into a validated result
pub fn parse(raw: &str) -> ParseOutcome {
    if raw.trim().is_empty() {
        return ParseOutcome::Failure("Empty response".to_string());
    }

    let mut last_error = None;
    for candidate in candidates(raw) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        match validate(&value) {
            Ok(result) => return ParseOutcome::Success(result),
            Err(reason) => last_error = Some(reason),
        }
    }

    ParseOutcome::Failure(
        last_error.unwrap_or_else(|| "No JSON object found in response".to_string()),
    )
}

/// Parse, mapping any failure to the canonical error result
pub fn parse_or_error(raw: &str) -> AnalysisResult {
    parse(raw).into_result()
}

fn validate(value: &Value) -> Result<AnalysisResult, String> {
    let root = value
        .as_object()
        .ok_or_else(|| "Response is not a JSON object".to_string())?;
    let summary = root
        .get("summary")
        .and_then(Value::as_object)
        .ok_or_else(|| "Missing 'summary' object".to_string())?;

    let raw_status = summary
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| "Missing 'summary.status'".to_string())?;
    let status = Verdict::from_alias(raw_status)
        .ok_or_else(|| format!("Unknown summary status '{}'", raw_status))?;

    let items = root
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).map(read_finding).collect())
        .unwrap_or_default();

    let counts = match (
        count(summary, "critical_error_count"),
        count(summary, "observation_count"),
        count(summary, "alert_count"),
    ) {
        (Some(c), Some(o), Some(a)) => Some((c, o, a)),
        _ => None,
    };

    let line_items = root
        .get("line_items")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(Value::as_object).map(read_line_item).collect());

    Ok(AnalysisResult::from_findings(
        status,
        text(summary, "conclusion"),
        items,
        counts,
        line_items,
    ))
}

fn read_finding(item: &Map<String, Value>) -> Finding {
    let kind = FindingKind::from_alias(&text(item, "kind"));
    let status = item
        .get("status")
        .and_then(Value::as_str)
        .and_then(Verdict::from_alias)
        .unwrap_or_else(|| kind.implied_verdict());

    Finding {
        field: text(item, "field"),
        status,
        kind,
        extracted_value: scalar(item.get("extracted_value")).unwrap_or_default(),
        description: text(item, "description"),
    }
}

fn read_line_item(row: &Map<String, Value>) -> LineItem {
    let field = |name: &str| scalar(row.get(name));
    LineItem {
        code: field("code"),
        description: field("description"),
        hs_code: field("hs_code"),
        quantity: field("quantity"),
        unit: field("unit"),
        unit_price: field("unit_price"),
        total_value: field("total_value"),
    }
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    scalar(map.get(key)).unwrap_or_default()
}

/// Stringify a JSON scalar; null and missing become None
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn count(map: &Map<String, Value>, key: &str) -> Option<u32> {
    map.get(key)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> AnalysisResult {
        AnalysisResult::from_findings(
            Verdict::Alert,
            "Incoterm inconsistent with freight terms",
            vec![
                Finding::new("incoterm", FindingKind::Alert, "FOB", "Freight marked prepaid"),
                Finding::new("currency", FindingKind::Ok, "USD", "Matches contract"),
            ],
            Some((0, 0, 1)),
            Some(vec![LineItem {
                code: Some("A-1".to_string()),
                hs_code: Some("0901.11.10".to_string()),
                quantity: Some("120".to_string()),
                ..LineItem::default()
            }]),
        )
    }

    #[test]
    fn test_fenced_json_round_trip() {
        let original = sample();
        let raw = format!(
            "Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&original).unwrap()
        );

        assert_eq!(parse(&raw), ParseOutcome::Success(original));
    }

    #[test]
    fn test_brace_span_in_prose() {
        let raw = r#"Sure! {"summary": {"status": "approved", "conclusion": "fine"}, "items": []} Done."#;
        match parse(raw) {
            ParseOutcome::Success(result) => {
                assert_eq!(result.summary.status, Verdict::Ok);
                assert_eq!(result.summary.conclusion, "fine");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_items() {
        let raw = r#"{"summary": {"status": "WARNING"},
            "items": [42, {"field": "weight", "kind": "weird", "extracted_value": 12.5}, {"kind": "critical"}]}"#;
        let ParseOutcome::Success(result) = parse(raw) else {
            panic!("expected success");
        };

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].kind, FindingKind::Observation);
        assert_eq!(result.items[0].extracted_value, "12.5");
        assert_eq!(result.items[1].field, "");
        assert_eq!(result.items[1].status, Verdict::Error);
        assert_eq!(result.summary.critical_error_count, 1);
        assert_eq!(result.summary.observation_count, 1);
        assert!(result.line_items.is_none());
    }

    #[test]
    fn test_error_without_critical_gets_one() {
        let raw = r#"{"summary": {"status": "rejected"}, "items": []}"#;
        let result = parse_or_error(raw);
        assert!(result.is_error());
        assert!(result.items.iter().any(|i| i.kind == FindingKind::CriticalError));
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse("   "), ParseOutcome::Failure("Empty response".to_string()));
        assert!(!parse("no json here").is_success());
        assert!(!parse(r#"{"items": []}"#).is_success());
        assert!(!parse(r#"{"summary": {"status": "maybe"}}"#).is_success());
        assert!(!parse(r#"{"summary": {"status": "ok""#).is_success());
    }

    #[test]
    fn test_parse_or_error_is_canonical() {
        let result = parse_or_error("garbage");
        assert!(result.is_error());
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].field, "parsing");
    }

    proptest! {
        #[test]
        fn parse_never_panics(raw in any::<String>()) {
            let _ = parse(&raw);
        }

        #[test]
        fn parse_or_error_upholds_error_invariant(raw in r#"[\{\}\[\]":,a-z0-9 `]{0,80}"#) {
            let result = parse_or_error(&raw);
            if result.is_error() {
                prop_assert!(result.items.iter().any(|i| i.kind == FindingKind::CriticalError));
                prop_assert!(result.summary.critical_error_count >= 1);
            }
        }
    }
}
