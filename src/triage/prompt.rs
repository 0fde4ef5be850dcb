//! Classification policy as a pure text template.
//!
//! The rubric lives here as data so it can be checked without a backend.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::triage::OverrideSet;

/// Instruction template. Placeholders are substituted in a single pass, so
/// braces inside the subject or body are never re-expanded.
pub const TRIAGE_TEMPLATE: &str = r##"You are a mail triage assistant. Given an email subject, body, and optional user preferences:
- Assign priority as an integer 1 (urgent) to 5 (lowest).
- Produce tags as a JSON array of strings. If user preferred tags are relevant, include them and prefix user-specific ones with '#'.
- Produce a concise summary between 3 and 20 words.
- Return a subject_truncated suitable for dashboards.

Constraints:
- Output valid JSON only with keys: priority, tags, summary, subject_truncated.
- priority must be an integer 1..5.
- tags must be a JSON array of strings, e.g. ["registration","#deadlines"].
- summary must be 3 to 20 words.
- subject_truncated must be <= {subject_max} characters (truncate with ellipsis when needed).
- If user overrides exist and clearly match, they take precedence.

Inputs:
- subject: {subject}
- body: {body}
- user_priority_overrides: {overrides_json}
- user_preferred_tags: {preferred_tags_json}

Priority rules (decide strictly):
- 1 (urgent): Time/venue change or deadlines happening soon. Keywords like: "today", "tomorrow", specific times (e.g., "9am"), "urgent", "immediately", "deadline", "last date", "due", "closes", "rescheduled", "venue change", "time change", "class cancelled", "exam schedule". Treat class venue/time changes or registration deadlines as 1.
- 2 (high): Action required within a few days (3-7 days), official notices requiring prompt attention.
- 3 (normal): General information or FYI without immediate action. If the information is flagged important, use 2.
- 4 (low): Routine updates with no action or time pressure.
- 5 (lowest): Promotions/ads/marketing.

Subject truncation:
- <= {subject_max} characters; if longer, cut and add an ellipsis.

If user overrides exist and clearly match, they take precedence.
Return ONLY JSON. No extra text.

Examples (for guidance, do not copy text):
- Subject: "Class venue change: 9am today" -> priority: 1
- Subject: "Registration deadline tomorrow 6 PM" -> priority: 1
- Subject: "Exam rescheduled to Monday 2 PM" -> priority: 1
"##;

/// Marker distinguishing user-namespaced tags
pub const USER_TAG_MARKER: char = '#';

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(subject_max|subject|body|overrides_json|preferred_tags_json)\}")
            .expect("placeholder pattern is a valid regex")
    })
}

/// Build the instruction for one message.
///
/// Subject and body are embedded as JSON string literals, the override map
/// as a JSON object (`{}` when empty) and the preferred tags as a JSON array
/// (`[]` when empty).
pub fn build_request(subject: &str, body: &str, overrides: &OverrideSet, subject_max: usize) -> String {
    let subject_json = json_literal(&subject);
    let body_json = json_literal(&body);
    let overrides_json = json_literal(&overrides.priority_overrides);
    let preferred_json = json_literal(&overrides.preferred_tags);
    let subject_max = subject_max.to_string();

    placeholder_regex()
        .replace_all(TRIAGE_TEMPLATE, |caps: &Captures<'_>| match &caps[1] {
            "subject_max" => subject_max.clone(),
            "subject" => subject_json.clone(),
            "body" => body_json.clone(),
            "overrides_json" => overrides_json.clone(),
            _ => preferred_json.clone(),
        })
        .into_owned()
}

fn json_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    // Strings, string maps and string lists always serialize
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn embeds_inputs_as_json() {
        let prompt = build_request(
            "Class venue change: 9am today",
            "Class moved to room \"A-203\" at 9:00 AM today.",
            &OverrideSet::default(),
            72,
        );

        assert!(prompt.contains(r#"- subject: "Class venue change: 9am today""#));
        assert!(prompt.contains(r#"- body: "Class moved to room \"A-203\" at 9:00 AM today.""#));
        assert!(prompt.contains("- user_priority_overrides: {}"));
        assert!(prompt.contains("- user_preferred_tags: []"));
        assert!(prompt.contains("subject_truncated must be <= 72 characters"));
        assert!(!prompt.contains("{subject_max}"));
    }

    #[test]
    fn embeds_overrides() {
        let mut priority_overrides = BTreeMap::new();
        priority_overrides.insert("placement".to_string(), 1);
        priority_overrides.insert("canteen".to_string(), 5);
        let overrides = OverrideSet {
            priority_overrides,
            preferred_tags: vec!["deadlines".to_string(), "placements".to_string()],
        };

        let prompt = build_request("s", "b", &overrides, 40);
        assert!(prompt.contains(r#"- user_priority_overrides: {"canteen":5,"placement":1}"#));
        assert!(prompt.contains(r#"- user_preferred_tags: ["deadlines","placements"]"#));
        assert!(prompt.contains("<= 40 characters"));
    }

    #[test]
    fn placeholders_in_inputs_are_not_expanded() {
        let prompt = build_request("{body}", "{subject_max}", &OverrideSet::default(), 72);
        assert!(prompt.contains(r#"- subject: "{body}""#));
        assert!(prompt.contains(r#"- body: "{subject_max}""#));
    }

    #[test]
    fn rubric_is_stable() {
        let a = build_request("Registration deadline tomorrow 6 PM", "Complete registration by 6 PM tomorrow.", &OverrideSet::default(), 72);
        let b = build_request("Registration deadline tomorrow 6 PM", "Complete registration by 6 PM tomorrow.", &OverrideSet::default(), 72);
        assert_eq!(a, b);
        assert!(a.contains("1 (urgent)"));
        assert!(a.contains("5 (lowest): Promotions/ads/marketing."));
        assert!(a.contains(r#""Registration deadline tomorrow 6 PM" -> priority: 1"#));
    }

    #[test]
    fn user_tag_example_survives_in_template() {
        // The example tag carries the user marker right after a quote
        assert!(TRIAGE_TEMPLATE.contains(r##"["registration","#deadlines"]"##));
        assert!(TRIAGE_TEMPLATE.trim_end().ends_with("-> priority: 1"));
        let prompt = build_request("s", "b", &OverrideSet::default(), 72);
        assert!(prompt.contains(r##""#deadlines""##));
    }
}
