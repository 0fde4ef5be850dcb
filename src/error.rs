//! Error types for the ingestion and triage pipeline.
//!
//! Decode problems inside a message part and malformed backend output are
//! recovered where they happen and never show up here. A duplicate natural
//! key is a normal skip outcome, not an error.

/// Run-level failure surfaced to the caller of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Classification backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Mailbox collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox unreachable: {0}")]
    Transport(String),

    #[error("Message {0} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Insert failed: {0}")]
    Insert(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Classification backend failures. Never produced for malformed output,
/// only for exchanges that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unreadable backend envelope: {0}")]
    Envelope(String),
}

impl BackendError {
    /// True when the backend could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Timeout(_))
    }
}

/// Publish collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publish rejected by {target}: {reason}")]
    Rejected { target: String, reason: String },

    #[error("Publish transport error: {0}")]
    Transport(String),
}

/// Whole-message parse failure. Per-part decode failures are not errors.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Message is empty")]
    Empty,

    #[error("Message could not be parsed as RFC 5322")]
    Unparsable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transport_classification() {
        assert!(BackendError::Transport("refused".into()).is_transport());
        assert!(BackendError::Timeout(Duration::from_secs(60)).is_transport());
        assert!(!BackendError::Status { status: 500, body: "boom".into() }.is_transport());
    }

    #[test]
    fn pipeline_error_wraps_sources() {
        let err: PipelineError = StoreError::Lookup("connection reset".into()).into();
        assert_eq!(err.to_string(), "Storage error: Lookup failed: connection reset");
    }
}
