use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Serialize;

use crate::config::{Config, MailboxConfig};
use crate::email::{IngestionReport, TriageReport};
use crate::mailbox::{EmlDirectoryMailbox, GmailMailbox, Mailbox};
use crate::pipeline::{Coordinator, PipelineSettings};
use crate::publish::{HttpPublisher, Publisher, SlackPublisher};
use crate::store::{Database, MemoryStore, MessageStore};
use crate::triage::{ClassificationResult, OllamaBackend, OverrideSet, Triager};

/// Which stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Fetch and store new emails only
    Ingest,
    /// Classify stored emails only
    Triage,
    /// Ingest, then classify
    All,
}

impl RunMode {
    fn ingests(self) -> bool {
        matches!(self, RunMode::Ingest | RunMode::All)
    }

    fn triages(self) -> bool {
        matches!(self, RunMode::Triage | RunMode::All)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub ingestion: Option<IngestionReport>,
    pub triage: Option<TriageReport>,
}

/// Per-run limits coming from the command line
#[derive(Debug, Default, Clone, Copy)]
pub struct RunLimits {
    pub ingest: Option<usize>,
    pub triage: Option<usize>,
}

/// Opens the collaborators named by the configuration for each run and
/// releases them when the run ends.
pub struct NotiflyProcessor {
    config: Config,
    dry_run: bool,
}

impl NotiflyProcessor {
    pub fn new(config: Config) -> Self {
        info!("Initializing Notifly processor");
        NotiflyProcessor { config, dry_run: false }
    }

    pub fn new_dry_run(config: Config) -> Self {
        info!("🧪 Initializing Notifly processor in dry-run mode (in-memory store, no publishing)");
        NotiflyProcessor { config, dry_run: true }
    }

    pub async fn run(&self, mode: RunMode, limits: RunLimits) -> Result<RunSummary> {
        if self.dry_run {
            println!("\n{}", "=".repeat(80));
            println!("🧪 DRY-RUN MODE - {:?}", mode);
            println!("{}", "=".repeat(80));

            // Everything stays in memory
            let store = MemoryStore::new();
            let summary = self.run_with_store(&store, &[], mode, limits).await?;
            Self::print_dry_run(&store);
            return Ok(summary);
        }

        // Open the store and publishers for this run only
        let database = Database::new(&self.config.database)
            .await
            .context("Unable to initialize database")?;
        let publishers = self.build_publishers();

        let result = self.run_with_store(&database, &publishers, mode, limits).await;
        database.close().await;

        // Report a failed run to every publisher able to notify
        if let Err(e) = &result {
            for publisher in &publishers {
                if let Err(notify_err) = publisher.notify_failure(&format!("{:#}", e)).await {
                    warn!("Unable to notify {} of the failure: {}", publisher.name(), notify_err);
                }
            }
        }
        result
    }

    async fn run_with_store(
        &self,
        store: &dyn MessageStore,
        publishers: &[Box<dyn Publisher>],
        mode: RunMode,
        limits: RunLimits,
    ) -> Result<RunSummary> {
        let settings = PipelineSettings {
            ingest_limit: limits.ingest.or(self.config.ingest_limit),
            triage_limit: limits.triage,
            triage_delay: self.config.triage.delay,
            only_unclassified: self.config.triage.only_unclassified,
        };
        let coordinator = Coordinator::new(store, publishers, settings);
        let mut summary = RunSummary::default();

        // Ingestion
        if mode.ingests() {
            let mailbox = self.open_mailbox().await?;
            let report = coordinator
                .run_ingestion(mailbox.as_ref())
                .await
                .context("Ingestion aborted")?;
            summary.ingestion = Some(report);
        }

        // Triage
        if mode.triages() {
            let triager = self.build_triager().await?;
            let report = coordinator
                .run_triage_batch(&triager)
                .await
                .context("Triage aborted")?;
            summary.triage = Some(report);
        }

        Ok(summary)
    }

    async fn open_mailbox(&self) -> Result<Box<dyn Mailbox>> {
        Ok(match &self.config.mailbox {
            MailboxConfig::Directory(dir) => Box::new(EmlDirectoryMailbox::new(dir)),
            MailboxConfig::Gmail(gmail) => Box::new(
                GmailMailbox::new(gmail)
                    .await
                    .context("Unable to connect to Gmail API")?,
            ),
        })
    }

    async fn build_triager(&self) -> Result<Triager> {
        build_triager(&self.config).await
    }

    fn build_publishers(&self) -> Vec<Box<dyn Publisher>> {
        let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();

        if let Some(slack_config) = &self.config.slack {
            match SlackPublisher::new(slack_config) {
                Ok(slack) => {
                    info!("✅ Slack publishing enabled");
                    publishers.push(Box::new(slack));
                }
                Err(e) => warn!("⚠️  Unable to initialize Slack publisher: {} - Slack disabled", e),
            }
        } else {
            info!("ℹ️  Slack publishing not configured");
        }

        if let Some(url) = &self.config.publish_url {
            match HttpPublisher::new(url.clone()) {
                Ok(http) => {
                    info!("✅ HTTP publishing enabled ({})", url);
                    publishers.push(Box::new(http));
                }
                Err(e) => warn!("⚠️  Unable to initialize HTTP publisher: {}", e),
            }
        }

        publishers
    }

    fn print_dry_run(store: &MemoryStore) {
        let classifications = store.classifications();

        for stored in store.messages() {
            let message = &stored.message;
            println!("📧 #{} {}", stored.id, message.subject);
            println!("   From: {}", message.sender);
            match message.received_at {
                Some(date) => println!("   Date: {}", date.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("   Date: (none)"),
            }
            println!("   Body: {} chars", message.body.chars().count());

            if let Some((_, result)) = classifications.iter().find(|(id, _)| *id == stored.id) {
                println!(
                    "   ➜ priority {} | tags {:?} | {}",
                    result.priority, result.tags, result.summary
                );
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

/// Triager configured from the environment: backend, overrides, bounds
pub async fn build_triager(config: &Config) -> Result<Triager> {
    let backend = OllamaBackend::new(&config.backend)
        .context("Unable to create classification backend client")?;

    // Startup reachability check, not fatal
    if let Err(e) = backend.check().await {
        warn!("⚠️  Ollama not reachable at startup: {}", e);
    }

    let overrides = match &config.triage.overrides_path {
        Some(path) => OverrideSet::load(path)?,
        None => OverrideSet::default(),
    };

    Ok(Triager::new(Box::new(backend), config.triage.subject_max)
        .with_overrides(overrides)
        .with_clamp_priority(config.triage.clamp_priority))
}

pub const SELF_TEST_SUBJECT: &str = "Registration deadline tomorrow 6 PM";
pub const SELF_TEST_BODY: &str = "Complete course registration by 6 PM tomorrow to avoid late fees.";

/// Classify the demo message end to end against the configured backend
pub async fn self_test(config: &Config) -> Result<ClassificationResult> {
    let triager = build_triager(config).await?;
    triager
        .classify(SELF_TEST_SUBJECT, SELF_TEST_BODY)
        .await
        .map_err(|e| {
            error!("❌ Self-test failed: {}", e);
            anyhow::Error::new(e).context("Self-test classification failed")
        })
}
