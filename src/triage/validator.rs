//! Schema enforcement and deterministic repair of backend output.
//!
//! Validation never fails: every field of the result is always populated,
//! falling back to defaults when the backend text is malformed.

use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::triage::ClassificationResult;

pub const DEFAULT_PRIORITY: i64 = 3;
pub const MAX_SUMMARY_WORDS: usize = 20;
pub const ELLIPSIS: char = '\u{2026}';

/// Backend output before repair. No field is assumed present.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    tags: Option<Value>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    subject_truncated: Option<Value>,
}

fn object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("object pattern is a valid regex"))
}

/// Turn raw backend text into a fully populated result.
pub fn validate(raw: &str, original_subject: &str, max_subject_len: usize) -> ClassificationResult {
    let parsed = parse_raw(raw);

    let subject_truncated = match parsed.subject_truncated.as_ref().and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => truncate_subject(s, max_subject_len),
        _ => truncate_subject(original_subject, max_subject_len),
    };

    let result = ClassificationResult {
        priority: coerce_priority(parsed.priority.as_ref()),
        tags: coerce_tags(parsed.tags.as_ref()),
        summary: coerce_summary(parsed.summary.as_ref()),
        subject_truncated,
    };

    if !result.priority_in_range() {
        warn!("Backend priority {} is outside 1..=5", result.priority);
    }
    result
}

fn parse_raw(raw: &str) -> RawClassification {
    if let Some(parsed) = parse_object(raw.trim()) {
        return parsed;
    }

    // Prose around the object: retry on the outermost {...} span
    if let Some(span) = object_regex().find(raw) {
        if let Some(parsed) = parse_object(span.as_str()) {
            debug!("Extracted JSON object from surrounding backend text");
            return parsed;
        }
    }

    warn!("Backend output is not a JSON object, using defaults");
    RawClassification::default()
}

fn parse_object(text: &str) -> Option<RawClassification> {
    match serde_json::from_str::<Value>(text).ok()? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

fn coerce_priority(value: Option<&Value>) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        debug!("Priority missing or not an integer ({:?}), defaulting to {}", value, DEFAULT_PRIORITY);
        DEFAULT_PRIORITY
    })
}

fn coerce_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(value_to_text).collect(),
        _ => Vec::new(),
    }
}

fn coerce_summary(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(v) => value_to_text(v),
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > MAX_SUMMARY_WORDS {
        debug!("Summary has {} words, keeping the first {}", words.len(), MAX_SUMMARY_WORDS);
        return words[..MAX_SUMMARY_WORDS].join(" ");
    }
    text.trim().to_string()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deterministic subject truncation, counted in characters.
///
/// Trims whitespace; text that fits is returned unchanged. With `max <= 1`
/// the first `max` characters are returned without ellipsis. Otherwise the
/// first `max - 1` characters, right-trimmed, are followed by `…`.
pub fn truncate_subject(subject: &str, max: usize) -> String {
    let subject = subject.trim();
    if subject.chars().count() <= max {
        return subject.to_string();
    }
    if max <= 1 {
        return subject.chars().take(max).collect();
    }

    let head: String = subject.chars().take(max - 1).collect();
    let mut truncated = head.trim_end().to_string();
    truncated.push(ELLIPSIS);
    truncated
}
