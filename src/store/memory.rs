use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::email::{CanonicalMessage, NaturalKey, StoredMessage};
use crate::error::StoreError;
use crate::store::MessageStore;
use crate::triage::ClassificationResult;

/// In-process store used for dry runs and tests
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: Vec<StoredMessage>,
    classifications: Vec<(i64, ClassificationResult)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Query("memory store lock poisoned".to_string()))
    }

    /// Snapshot of stored messages in insertion order
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.lock().map(|inner| inner.messages.clone()).unwrap_or_default()
    }

    /// Snapshot of saved classifications as (message id, result)
    pub fn classifications(&self) -> Vec<(i64, ClassificationResult)> {
        self.lock()
            .map(|inner| inner.classifications.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn exists_by_key(&self, key: NaturalKey<'_>) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(inner.messages.iter().any(|m| m.message.natural_key() == key))
    }

    async fn insert(&self, message: &CanonicalMessage) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.messages.len() as i64 + 1;
        inner.messages.push(StoredMessage {
            id,
            message: message.clone(),
        });
        Ok(id)
    }

    async fn messages_for_triage(
        &self,
        only_unclassified: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.lock()?;
        let mut selected: Vec<StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| {
                !only_unclassified || !inner.classifications.iter().any(|(id, _)| *id == m.id)
            })
            .cloned()
            .collect();

        // Newest first, unknown dates last, ties by newest id
        selected.sort_by(|a, b| match (a.message.received_at, b.message.received_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });

        if let Some(limit) = limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn save_classification(
        &self,
        message_id: i64,
        result: &ClassificationResult,
    ) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        if !inner.messages.iter().any(|m| m.id == message_id) {
            return Err(StoreError::Insert(format!("unknown email id {}", message_id)));
        }
        inner.classifications.push((message_id, result.clone()));
        Ok(inner.classifications.len() as i64)
    }

    async fn count_messages(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.messages.len())
    }
}
