/// Read-only mailbox collaborators
pub mod eml_dir;
pub mod gmail;

use async_trait::async_trait;

use crate::error::MailboxError;

pub use eml_dir::EmlDirectoryMailbox;
pub use gmail::GmailMailbox;

/// Read-only access to a message store
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List message identifiers in fetch order, stopping after `limit` when given
    async fn list_ids(&self, limit: Option<usize>) -> Result<Vec<String>, MailboxError>;

    /// Retrieve the raw RFC 5322 bytes of one message
    async fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, MailboxError>;

    /// Human readable description (for logging)
    fn describe(&self) -> String;
}
