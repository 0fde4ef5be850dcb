/// Triage: rule-governed classification of a canonical message
pub mod backend;
pub mod prompt;
pub mod validator;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub use backend::{ClassificationBackend, OllamaBackend};
pub use prompt::{build_request, USER_TAG_MARKER};
pub use validator::{truncate_subject, validate};

/// Bounded, schema-valid classification of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// 1 = most urgent, 5 = least
    pub priority: i64,
    pub tags: Vec<String>,
    pub summary: String,
    pub subject_truncated: String,
}

impl ClassificationResult {
    pub fn priority_in_range(&self) -> bool {
        (1..=5).contains(&self.priority)
    }

    pub fn clamped(mut self) -> Self {
        self.priority = self.priority.clamp(1, 5);
        self
    }

    /// Tags carrying the user namespace marker
    pub fn user_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|t| t.starts_with(USER_TAG_MARKER))
    }
}

/// Per-request user preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default, alias = "user_priority_overrides")]
    pub priority_overrides: BTreeMap<String, i64>,
    #[serde(default, alias = "user_preferred_tags")]
    pub preferred_tags: Vec<String>,
}

impl OverrideSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read overrides file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid overrides file {}", path.display()))
    }
}

/// Builds the instruction, submits it and repairs the answer
pub struct Triager {
    backend: Box<dyn ClassificationBackend>,
    overrides: OverrideSet,
    subject_max: usize,
    clamp_priority: bool,
}

impl Triager {
    pub fn new(backend: Box<dyn ClassificationBackend>, subject_max: usize) -> Self {
        Triager {
            backend,
            overrides: OverrideSet::default(),
            subject_max,
            clamp_priority: false,
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideSet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_clamp_priority(mut self, clamp: bool) -> Self {
        self.clamp_priority = clamp;
        self
    }

    pub fn build_request(&self, subject: &str, body: &str) -> String {
        build_request(subject, body, &self.overrides, self.subject_max)
    }

    /// Classify one message. Errors only when the backend exchange fails;
    /// malformed output is repaired.
    pub async fn classify(&self, subject: &str, body: &str) -> Result<ClassificationResult, BackendError> {
        let prompt = self.build_request(subject, body);
        let raw = self.backend.complete(&prompt).await?;
        debug!("Backend answered with {} chars", raw.len());

        let result = validate(&raw, subject, self.subject_max);
        Ok(if self.clamp_priority { result.clamped() } else { result })
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping() {
        let result = ClassificationResult {
            priority: 9,
            tags: vec!["exam".to_string(), "#mine".to_string()],
            summary: String::new(),
            subject_truncated: String::new(),
        };
        assert!(!result.priority_in_range());
        let clamped = result.clamped();
        assert_eq!(clamped.priority, 5);
        assert_eq!(clamped.user_tags().collect::<Vec<_>>(), vec!["#mine"]);
    }

    #[test]
    fn overrides_accept_both_spellings() {
        let a: OverrideSet = serde_json::from_str(
            r#"{"user_priority_overrides": {"placement": 1}, "user_preferred_tags": ["jobs"]}"#,
        )
        .unwrap();
        let b: OverrideSet = serde_json::from_str(
            r#"{"priority_overrides": {"placement": 1}, "preferred_tags": ["jobs"]}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::from_str::<OverrideSet>("{}").unwrap(), OverrideSet::default());
    }
}
