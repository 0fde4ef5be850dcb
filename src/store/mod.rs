//! Dedup Store Adapter.
//!
//! Messages are identified by their natural key (subject, sender, received
//! timestamp). Ingestion checks the key before inserting, so re-scanning an
//! unchanged mailbox never creates duplicate rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::email::{CanonicalMessage, NaturalKey, StoredMessage};
use crate::error::StoreError;
use crate::triage::ClassificationResult;

pub use memory::MemoryStore;
pub use postgres::Database;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// True when a message with exactly this key is already stored.
    /// Two absent timestamps match.
    async fn exists_by_key(&self, key: NaturalKey<'_>) -> Result<bool, StoreError>;

    /// Insert a message and return its surrogate id. Does not check the key.
    async fn insert(&self, message: &CanonicalMessage) -> Result<i64, StoreError>;

    /// Stored messages, most recently received first (unknown dates last,
    /// then newest id first).
    async fn messages_for_triage(
        &self,
        only_unclassified: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Persist a validated classification for a stored message
    async fn save_classification(
        &self,
        message_id: i64,
        result: &ClassificationResult,
    ) -> Result<i64, StoreError>;

    async fn count_messages(&self) -> Result<usize, StoreError>;
}
