/// Common structures shared by ingestion and triage
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Normalized representation of a fetched mail item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalMessage {
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub received_at: Option<DateTime<Utc>>,
}

impl CanonicalMessage {
    pub fn natural_key(&self) -> NaturalKey<'_> {
        NaturalKey {
            subject: &self.subject,
            sender: &self.sender,
            received_at: self.received_at,
        }
    }
}

/// (subject, sender, timestamp) tuple used to detect duplicates.
///
/// Two absent timestamps compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey<'a> {
    pub subject: &'a str,
    pub sender: &'a str,
    pub received_at: Option<DateTime<Utc>>,
}

/// A canonical message as read back from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub message: CanonicalMessage,
}

/// Outcome of one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub fetched: usize,
    pub stored: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}

impl IngestionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&mut self) {
        self.stored += 1;
    }

    pub fn duplicate(&mut self) {
        self.skipped_duplicate += 1;
    }

    pub fn failure(&mut self) {
        self.failed += 1;
    }
}

/// Outcome of one triage batch
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TriageReport {
    pub succeeded: usize,
    pub failed: usize,
    pub published: usize,
    pub publish_failed: usize,
}

impl TriageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self) {
        self.succeeded += 1;
    }

    pub fn failure(&mut self) {
        self.failed += 1;
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Success rate in percent, `None` when nothing was attempted.
    pub fn success_rate(&self) -> Option<f64> {
        match self.attempted() {
            0 => None,
            n => Some(self.succeeded as f64 * 100.0 / n as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(received_at: Option<DateTime<Utc>>) -> CanonicalMessage {
        CanonicalMessage {
            subject: "Exam rescheduled".to_string(),
            sender: "office@campus.edu".to_string(),
            body: "Now on Monday.".to_string(),
            received_at,
        }
    }

    #[test]
    fn absent_timestamps_share_a_key() {
        let a = message(None);
        let mut b = message(None);
        b.body = "A different body does not matter".to_string();
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn present_and_absent_timestamps_differ() {
        let a = message(None);
        let b = message(DateTime::from_timestamp(1_700_000_000, 0));
        assert_ne!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn success_rate() {
        let mut report = TriageReport::new();
        assert_eq!(report.success_rate(), None);
        report.success();
        report.success();
        report.success();
        report.failure();
        assert_eq!(report.success_rate(), Some(75.0));
    }
}
