use std::time::Duration;

use anyhow::Result;
use log::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub mailbox: MailboxConfig,
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub triage: TriageConfig,
    /// Per-run item cap, `None` when unlimited
    pub ingest_limit: Option<usize>,
    pub scheduler: SchedulerConfig,
    pub slack: Option<SlackConfig>,
    pub publish_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum MailboxConfig {
    Gmail(GmailConfig),
    Directory(String),
}

#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    /// Only required when a real database is opened
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub subject_max: usize,
    pub delay: Duration,
    pub clamp_priority: bool,
    pub overrides_path: Option<String>,
    pub only_unclassified: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["02:00", "14:00"])
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

pub const DEFAULT_SUBJECT_MAX: usize = 72;
pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_DELAY_MS: u64 = 500;
pub const DEFAULT_INGEST_LIMIT: usize = 50;

impl Config {
    /// Load from the process environment
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let mailbox = match (get("MAILBOX_DIR"), get("GMAIL_CREDENTIALS_PATH")) {
            (Some(dir), _) => MailboxConfig::Directory(dir),
            (None, Some(credentials_path)) => MailboxConfig::Gmail(GmailConfig {
                credentials_path,
                token_cache_path: get_or("GMAIL_TOKEN_CACHE_PATH", "./gmail-token-cache.json"),
                query: get_or("GMAIL_QUERY", "in:inbox"),
            }),
            (None, None) => anyhow::bail!(
                "Missing environment variables: GMAIL_CREDENTIALS_PATH or MAILBOX_DIR\n\
                 \n\
                 💡 Solutions :\n\
                 1. Create a .env file with your credentials:\n\
                    GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                    GMAIL_TOKEN_CACHE_PATH=./gmail-token-cache.json\n\
                 \n\
                 2. Or read messages from a directory of .eml files:\n\
                    export MAILBOX_DIR=./mail\n\
                    cargo run -- --dry-run"
            ),
        };

        let ingest_limit = match parse_or(&get, "INGEST_LIMIT", DEFAULT_INGEST_LIMIT) {
            0 => None,
            n => Some(n),
        };

        // Backend timeout: positive and representable, otherwise the default
        let timeout_secs = parse_or(&get, "OLLAMA_TIMEOUT", DEFAULT_TIMEOUT_SECS);
        let timeout = match Duration::try_from_secs_f64(timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => {
                warn!("Invalid OLLAMA_TIMEOUT {}, using {}s", timeout_secs, DEFAULT_TIMEOUT_SECS);
                Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64)
            }
        };

        Ok(Config {
            mailbox,
            database: DatabaseConfig {
                host: get_or("DB_HOST", "localhost"),
                port: parse_or(&get, "DB_PORT", 5432),
                database: get_or("DB_NAME", "notifly_db"),
                username: get_or("DB_USERNAME", "postgres"),
                password: get("DB_PASSWORD"),
            },
            backend: BackendConfig {
                url: get_or("OLLAMA_URL", "http://localhost:11434")
                    .trim_end_matches('/')
                    .to_string(),
                model: get_or("OLLAMA_MODEL", "gemma3:12b"),
                timeout,
                temperature: parse_or(&get, "OLLAMA_TEMPERATURE", 0.2),
            },
            triage: TriageConfig {
                subject_max: parse_or(&get, "SUBJECT_MAX", DEFAULT_SUBJECT_MAX),
                delay: Duration::from_millis(parse_or(&get, "TRIAGE_DELAY_MS", DEFAULT_DELAY_MS)),
                clamp_priority: parse_or(&get, "TRIAGE_CLAMP_PRIORITY", false),
                overrides_path: get("TRIAGE_OVERRIDES_PATH"),
                only_unclassified: parse_or(&get, "TRIAGE_ONLY_UNCLASSIFIED", true),
            },
            ingest_limit,
            scheduler: SchedulerConfig {
                enabled: parse_or(&get, "SCHEDULER_ENABLED", false),
                schedule_times: get_or("SCHEDULER_TIMES", "02:00")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            slack: match (get("SLACK_BOT_TOKEN"), get("SLACK_CHANNEL_ID")) {
                (Some(bot_token), Some(channel_id)) => Some(SlackConfig {
                    bot_token,
                    channel_id,
                }),
                _ => None,
            },
            publish_url: get("PUBLISH_URL"),
        })
    }
}

/// Parse a variable, falling back to `default` (with a warning) when it is
/// set but invalid.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using {}", raw, key, default);
                default
            }
        },
    }
}
