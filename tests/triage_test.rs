use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use notifly::error::BackendError;
use notifly::triage::{truncate_subject, validate, ClassificationBackend, OverrideSet, Triager};
use tempfile::NamedTempFile;

struct FixedBackend {
    answer: String,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl FixedBackend {
    fn new(answer: &str) -> (Self, Arc<Mutex<Option<String>>>) {
        let last_prompt = Arc::new(Mutex::new(None));
        let backend = FixedBackend {
            answer: answer.to_string(),
            last_prompt: last_prompt.clone(),
        };
        (backend, last_prompt)
    }
}

#[async_trait]
impl ClassificationBackend for FixedBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

#[tokio::test]
async fn test_overrides_file_reaches_the_prompt() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r##"{{"user_priority_overrides": {{"placement": 1}}, "user_preferred_tags": ["#jobs"]}}"##
    )
    .unwrap();
    let overrides = OverrideSet::load(file.path()).unwrap();
    assert_eq!(overrides.priority_overrides.get("placement"), Some(&1));

    let (backend, last_prompt) = FixedBackend::new(
        r##"{"priority": 1, "tags": ["placement", "#jobs"], "summary": "Placement drive registration closes Friday.", "subject_truncated": "Placement drive"}"##,
    );
    let triager = Triager::new(Box::new(backend), 72).with_overrides(overrides);

    let result = triager
        .classify("Placement drive", "Register for the placement drive by Friday.")
        .await
        .unwrap();
    assert_eq!(result.priority, 1);
    assert_eq!(result.user_tags().collect::<Vec<_>>(), vec!["#jobs"]);

    let prompt = last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains(r#""placement":1"#));
    assert!(prompt.contains(r##"["#jobs"]"##));
}

#[test]
fn test_invalid_overrides_file_is_reported() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(OverrideSet::load(file.path()).is_err());
    assert!(OverrideSet::load("/nonexistent/overrides.json").is_err());
}

#[tokio::test]
async fn test_long_subject_truncated_for_dashboard() {
    let (backend, _) = FixedBackend::new(r#"{"priority": 4, "tags": ["arts"], "summary": "Art exhibition opening night."}"#);
    let triager = Triager::new(Box::new(backend), 20);

    let result = triager
        .classify("Community Art Exhibition Opening Night Celebration", "Join us on Friday.")
        .await
        .unwrap();
    assert_eq!(result.subject_truncated, "Community Art Exhib\u{2026}");
    assert!(result.subject_truncated.chars().count() <= 20);
}

#[tokio::test]
async fn test_out_of_range_priority_kept_unless_clamping() {
    let answer = r#"{"priority": 7, "tags": [], "summary": "s", "subject_truncated": "x"}"#;

    let (backend, _) = FixedBackend::new(answer);
    let result = Triager::new(Box::new(backend), 72).classify("x", "").await.unwrap();
    assert_eq!(result.priority, 7);

    let (backend, _) = FixedBackend::new(answer);
    let result = Triager::new(Box::new(backend), 72)
        .with_clamp_priority(true)
        .classify("x", "")
        .await
        .unwrap();
    assert_eq!(result.priority, 5);
}

#[test]
fn test_validation_is_total() {
    let inputs = [
        "",
        "null",
        "[]",
        "{",
        r#"{"priority": "high"}"#,
        r#"{"tags": "exam"}"#,
        "Sure! Here you go: {\"priority\": 2, \"tags\": [\"exam\"]} Hope this helps.",
    ];
    for raw in inputs {
        let result = validate(raw, "Midterm schedule", 72);
        assert!(!result.subject_truncated.is_empty(), "input {:?}", raw);
        assert!(result.summary.split_whitespace().count() <= 20);
    }

    let embedded = validate(inputs[6], "Midterm schedule", 72);
    assert_eq!(embedded.priority, 2);
    assert_eq!(embedded.tags, vec!["exam"]);
}

#[test]
fn test_truncation_counts_characters() {
    assert_eq!(truncate_subject("Réunion : café à 9 h", 72), "Réunion : café à 9 h");
    assert_eq!(truncate_subject("ééééééééé", 5), "éééé\u{2026}");
    assert_eq!(truncate_subject("  padded  ", 72), "padded");
}
