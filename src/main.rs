use anyhow::Result;
use clap::Parser;
use log::{error, info};

use notifly::config::{Config, MailboxConfig};
use notifly::processor::{self, NotiflyProcessor, RunLimits, RunMode, RunSummary};

#[derive(Parser, Clone)]
#[command(name = "notifly")]
#[command(about = "Ingests, deduplicates and triages emails into priority, tags and summary")]
#[command(version = "0.1.0")]
struct Args {
    /// Stages to run
    #[arg(short, long, value_enum, default_value_t = RunMode::All)]
    mode: RunMode,

    /// Dry-run: in-memory store, nothing persisted or published
    #[arg(short, long)]
    dry_run: bool,

    /// Daemon mode: run on the configured schedule
    #[arg(long)]
    daemon: bool,

    /// Maximum number of emails fetched per run (overrides INGEST_LIMIT)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Maximum number of stored emails classified per run
    #[arg(long)]
    triage_limit: Option<usize>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,

    /// Classify a demo email and print the result
    #[arg(long)]
    selftest: bool,
}

impl Args {
    fn limits(&self) -> RunLimits {
        RunLimits {
            ingest: self.limit,
            triage: self.triage_limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting Notifly in DRY-RUN mode");
    } else {
        info!("🚀 Starting Notifly");
    }

    // Load configuration
    let config = Config::new()?;

    // Only check the configuration if requested
    if args.check_config {
        print_config(&config);
        return Ok(());
    }

    // Classify the demo email and stop
    if args.selftest {
        let result = processor::self_test(&config).await?;
        println!("\n-- Self-test result ---");
        println!("{}", serde_json::to_string_pretty(&result)?);
        println!("---\n");
        return Ok(());
    }

    // Daemon mode
    if args.daemon {
        info!("🔄 Starting in daemon mode");
        return run_daemon_mode(config, args).await;
    }

    // One-shot mode (default behavior)
    let processor = if args.dry_run {
        // Dry-run: in-memory store, no publishing
        NotiflyProcessor::new_dry_run(config)
    } else {
        // Production: PostgreSQL and configured publishers
        NotiflyProcessor::new(config)
    };

    match processor.run(args.mode, args.limits()).await {
        Ok(summary) => {
            log_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!("❌ Run failed: {:#}", e);
            Err(e)
        }
    }
}

fn print_config(config: &Config) {
    println!("✅ Configuration valid!");
    match &config.mailbox {
        MailboxConfig::Gmail(gmail) => {
            println!("📧 Gmail API OAuth2");
            println!("🔑 Credentials: {}", gmail.credentials_path);
            println!("💾 Token cache: {}", gmail.token_cache_path);
            println!("🔎 Query: {}", gmail.query);
        }
        MailboxConfig::Directory(dir) => println!("📁 Mailbox directory: {}", dir),
    }
    println!(
        "🗄️  Database: {}@{}:{}/{}{}",
        config.database.username,
        config.database.host,
        config.database.port,
        config.database.database,
        if config.database.password.is_some() { "" } else { " (DB_PASSWORD not set)" }
    );
    println!(
        "🤖 Backend: {} at {} (timeout {:?}, temperature {})",
        config.backend.model, config.backend.url, config.backend.timeout, config.backend.temperature
    );
    println!(
        "✂️  Subject max: {} | delay: {:?} | clamp priority: {}",
        config.triage.subject_max, config.triage.delay, config.triage.clamp_priority
    );
    match config.ingest_limit {
        Some(limit) => println!("📦 Ingest limit: {} per run", limit),
        None => println!("📦 Ingest limit: unlimited"),
    }
    println!("💬 Slack: {}", if config.slack.is_some() { "enabled" } else { "disabled" });
    println!("🌐 HTTP publish: {}", config.publish_url.as_deref().unwrap_or("disabled"));
}

fn log_summary(summary: &RunSummary) {
    if let Some(ingestion) = &summary.ingestion {
        info!(
            "✅ Ingestion: {} fetched, {} stored, {} duplicate(s), {} failed",
            ingestion.fetched, ingestion.stored, ingestion.skipped_duplicate, ingestion.failed
        );
    }
    if let Some(triage) = &summary.triage {
        info!(
            "✅ Triage: {} succeeded, {} failed, {} published, {} publish failure(s)",
            triage.succeeded, triage.failed, triage.published, triage.publish_failed
        );
    }
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    // The scheduler must be enabled in the configuration
    if !config.scheduler.enabled {
        error!("❌ Daemon mode requires SCHEDULER_ENABLED=true");
        anyhow::bail!("Scheduler not enabled in configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ No schedule times defined (SCHEDULER_TIMES)");
        anyhow::bail!("No schedule times defined");
    }

    info!("📅 Configured run times: {:?}", config.scheduler.schedule_times);

    // Create the scheduler
    let scheduler = JobScheduler::new().await?;

    // Add one job per configured time
    for schedule_time in &config.scheduler.schedule_times {
        let Some((hour, minute)) = schedule_time.split_once(':') else {
            error!("❌ Invalid schedule time: {}. Use the HH:MM format", schedule_time);
            continue;
        };

        // Cron format: "sec min hour day month weekday"
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Adding scheduled job: {} (cron: {})", schedule_time, cron_expr);

        // Clone what the closure needs
        let config_clone = config.clone();
        let dry_run = args.dry_run;
        let mode = args.mode;
        let limits = args.limits();
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Scheduled run at {}", schedule_time);

                let processor = if dry_run {
                    NotiflyProcessor::new_dry_run(config)
                } else {
                    NotiflyProcessor::new(config)
                };

                match processor.run(mode, limits).await {
                    Ok(summary) => log_summary(&summary),
                    Err(e) => error!("❌ Scheduled run at {} failed: {:#}", schedule_time, e),
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    // Start the scheduler
    scheduler.start().await?;

    info!("✅ Daemon started. Waiting for scheduled times...");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    // Keep the program alive
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        // Hourly log to show the daemon is alive
        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}
