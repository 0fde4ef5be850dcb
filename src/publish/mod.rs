/// Downstream publishing of validated classifications
pub mod http;
pub mod slack;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PublishError;
use crate::triage::ClassificationResult;

pub use http::HttpPublisher;
pub use slack::SlackPublisher;

/// A validated result together with the message it was derived from
#[derive(Debug, Clone, Serialize)]
pub struct PublishItem<'a> {
    pub message_id: i64,
    pub subject: &'a str,
    pub body: &'a str,
    #[serde(flatten)]
    pub result: &'a ClassificationResult,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// `Ok` when the downstream store accepted the item
    async fn publish(&self, item: &PublishItem<'_>) -> Result<(), PublishError>;

    /// Report a run-level failure. Publishers without a notification
    /// channel ignore it.
    async fn notify_failure(&self, _text: &str) -> Result<(), PublishError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Human readable label for a priority level
pub fn priority_label(priority: i64) -> &'static str {
    match priority {
        1 => "URGENT",
        2 => "HIGH",
        3 => "NORMAL",
        4 => "LOW",
        5 => "LOWEST",
        _ => "UNKNOWN",
    }
}
