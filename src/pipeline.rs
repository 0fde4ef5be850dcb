//! Pipeline Coordinator.
//!
//! Sequences normalize → dedup check → store for ingestion, and
//! classify → persist → publish for triage. Runs are sequential; a failing
//! item is counted and skipped, only run-level failures abort.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::email::{normalize, IngestionReport, StoredMessage, TriageReport};
use crate::error::{MailboxError, PipelineError};
use crate::mailbox::Mailbox;
use crate::publish::{PublishItem, Publisher};
use crate::store::MessageStore;
use crate::triage::Triager;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Per-run cap on fetched messages
    pub ingest_limit: Option<usize>,
    /// Cap on records classified per batch
    pub triage_limit: Option<usize>,
    /// Fixed pause between consecutive backend calls
    pub triage_delay: Duration,
    pub only_unclassified: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            ingest_limit: None,
            triage_limit: None,
            triage_delay: Duration::from_millis(crate::config::DEFAULT_DELAY_MS),
            only_unclassified: true,
        }
    }
}

pub struct Coordinator<'a> {
    store: &'a dyn MessageStore,
    publishers: &'a [Box<dyn Publisher>],
    settings: PipelineSettings,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        store: &'a dyn MessageStore,
        publishers: &'a [Box<dyn Publisher>],
        settings: PipelineSettings,
    ) -> Self {
        Coordinator {
            store,
            publishers,
            settings,
        }
    }

    /// Fetch a bounded batch, normalize each message and insert the ones
    /// whose natural key is not stored yet.
    pub async fn run_ingestion(&self, mailbox: &dyn Mailbox) -> Result<IngestionReport, PipelineError> {
        info!("Starting ingestion from {}", mailbox.describe());

        // List the batch; failing here aborts the run
        let ids = mailbox.list_ids(self.settings.ingest_limit).await?;
        let mut report = IngestionReport::new();

        for (index, id) in ids.iter().enumerate() {
            debug!("Email {}/{} (ID: {})", index + 1, ids.len(), id);

            // Fetch the raw message
            let raw = match mailbox.fetch_raw(id).await {
                Ok(raw) => raw,
                Err(MailboxError::Transport(e)) if index == 0 => {
                    error!("Mailbox unreachable before any email was processed: {}", e);
                    return Err(MailboxError::Transport(e).into());
                }
                Err(e) => {
                    warn!("Unable to fetch email {}: {}", id, e);
                    report.failure();
                    continue;
                }
            };
            report.fetched += 1;

            // Normalize
            let message = match normalize(&raw) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Unable to normalize email {}: {}", id, e);
                    report.failure();
                    continue;
                }
            };

            // Skip messages already stored under the same natural key
            match self.store.exists_by_key(message.natural_key()).await {
                Ok(true) => {
                    debug!("Existing email skipped: '{}' from {}", message.subject, message.sender);
                    report.duplicate();
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Dedup lookup failed for email {}: {}", id, e);
                    report.failure();
                    continue;
                }
            }

            // Store
            match self.store.insert(&message).await {
                Ok(record_id) => {
                    debug!("Email {} stored as #{}", id, record_id);
                    report.stored();
                }
                Err(e) => {
                    error!("Unable to store email {}: {}", id, e);
                    report.failure();
                }
            }
        }

        info!(
            "Ingestion completed: {} fetched, {} stored, {} duplicate(s) skipped, {} failed",
            report.fetched, report.stored, report.skipped_duplicate, report.failed
        );
        Ok(report)
    }

    /// Classify stored records, most recently received first
    pub async fn run_triage_batch(&self, triager: &Triager) -> Result<TriageReport, PipelineError> {
        let records = self.store
            .messages_for_triage(self.settings.only_unclassified, self.settings.triage_limit)
            .await?;
        self.triage_records(&records, triager).await
    }

    /// Classify the given records in order, pausing between backend calls
    pub async fn triage_records(
        &self,
        records: &[StoredMessage],
        triager: &Triager,
    ) -> Result<TriageReport, PipelineError> {
        info!("🚀 Starting triage of {} email(s) with {}", records.len(), triager.describe());

        let mut report = TriageReport::new();

        for (index, record) in records.iter().enumerate() {
            // Throttle backend calls
            if index > 0 && !self.settings.triage_delay.is_zero() {
                tokio::time::sleep(self.settings.triage_delay).await;
            }

            let message = &record.message;
            debug!("📧 Triage {}/{} (ID: {}) '{}'", index + 1, records.len(), record.id, message.subject);

            // Classify and repair
            let result = match triager.classify(&message.subject, &message.body).await {
                Ok(result) => result,
                Err(e) if e.is_transport() && report.attempted() == 0 => {
                    error!("Classification backend unreachable: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("❌ Triage failed for email {}: {}", record.id, e);
                    report.failure();
                    continue;
                }
            };

            // Persist before publishing
            if let Err(e) = self.store.save_classification(record.id, &result).await {
                error!("Unable to save classification for email {}: {}", record.id, e);
                report.failure();
                continue;
            }

            info!(
                "✅ Email {} classified: priority {} tags {:?}",
                record.id, result.priority, result.tags
            );
            report.success();

            let item = PublishItem {
                message_id: record.id,
                subject: &message.subject,
                body: &message.body,
                result: &result,
            };
            // Publish to each target in turn
            for publisher in self.publishers {
                match publisher.publish(&item).await {
                    Ok(()) => report.published += 1,
                    Err(e) => {
                        warn!("Publisher {} did not accept email {}: {}", publisher.name(), record.id, e);
                        report.publish_failed += 1;
                    }
                }
            }
        }

        match report.success_rate() {
            Some(rate) => info!(
                "📊 Triage completed: {} succeeded, {} failed ({:.1}% success)",
                report.succeeded, report.failed, rate
            ),
            None => info!("📭 No email to triage"),
        }
        Ok(report)
    }
}
