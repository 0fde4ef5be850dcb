use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::{PgPool, Row};

use crate::config::DatabaseConfig;
use crate::email::{CanonicalMessage, NaturalKey, StoredMessage};
use crate::error::StoreError;
use crate::store::MessageStore;
use crate::triage::ClassificationResult;

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL database {}@{}:{}/{}",
              config.username, config.host, config.port, config.database);

        // The password is only required here, not for dry runs
        let password = config.password.as_deref()
            .context("DB_PASSWORD must be set to open the database")?;

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            config.username, password, config.host, config.port, config.database
        );

        // Open the connection pool
        let pool = PgPool::connect(&database_url)
            .await
            .context("Unable to connect to the database")?;

        info!("Database connection established");

        // Create the schema on first run
        let db = Database { pool };
        db.create_tables_if_not_exists().await?;

        Ok(db)
    }

    async fn create_tables_if_not_exists(&self) -> Result<()> {
        info!("Checking/creating database tables");

        // One row per distinct natural key
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                id BIGSERIAL PRIMARY KEY,
                subject TEXT NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                received_date TIMESTAMPTZ,
                fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        )
        .execute(&self.pool)
        .await
        .context("Unable to create emails table")?;

        // Validated triage results, several per email when re-triaged
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS classifications (
                id BIGSERIAL PRIMARY KEY,
                email_id BIGINT NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                priority BIGINT NOT NULL,
                tags TEXT[] NOT NULL,
                summary TEXT NOT NULL,
                subject_truncated TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        )
        .execute(&self.pool)
        .await
        .context("Unable to create classifications table")?;

        // Natural key lookup
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_emails_natural_key ON emails (subject, sender, received_date)"
        )
        .execute(&self.pool)
        .await
        .context("Unable to create natural key index")?;

        // Triage order
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_emails_received ON emails (received_date DESC NULLS LAST, id DESC)"
        )
        .execute(&self.pool)
        .await
        .context("Unable to create received_date index")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_classifications_email ON classifications (email_id)"
        )
        .execute(&self.pool)
        .await
        .context("Unable to create classifications index")?;

        info!("Database tables checked/created successfully");
        Ok(())
    }

    pub async fn close(self) {
        info!("Closing database connection");
        self.pool.close().await;
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn exists_by_key(&self, key: NaturalKey<'_>) -> Result<bool, StoreError> {
        let exists = sqlx::query(
            r#"
            SELECT 1 FROM emails
            WHERE subject = $1 AND sender = $2 AND received_date IS NOT DISTINCT FROM $3
            LIMIT 1
            "#
        )
        .bind(key.subject)
        .bind(key.sender)
        .bind(key.received_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Lookup(e.to_string()))?;

        Ok(exists.is_some())
    }

    async fn insert(&self, message: &CanonicalMessage) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO emails (subject, sender, body, received_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#
        )
        .bind(&message.subject)
        .bind(&message.sender)
        .bind(&message.body)
        .bind(message.received_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Insert(e.to_string()))?;

        let id: i64 = row.get("id");
        debug!("Email saved: #{} '{}'", id, message.subject);
        Ok(id)
    }

    async fn messages_for_triage(
        &self,
        only_unclassified: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let limit = limit.map(|l| l.min(i64::MAX as usize) as i64);

        let rows = sqlx::query(
            r#"
            SELECT e.id, e.subject, e.sender, e.body, e.received_date
            FROM emails e
            WHERE NOT $1 OR NOT EXISTS (SELECT 1 FROM classifications c WHERE c.email_id = e.id)
            ORDER BY e.received_date DESC NULLS LAST, e.id DESC
            LIMIT $2
            "#
        )
        .bind(only_unclassified)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let messages = rows
            .into_iter()
            .map(|row| StoredMessage {
                id: row.get("id"),
                message: CanonicalMessage {
                    subject: row.get("subject"),
                    sender: row.get("sender"),
                    body: row.get("body"),
                    received_at: row.get::<Option<DateTime<Utc>>, _>("received_date"),
                },
            })
            .collect::<Vec<_>>();

        info!("Fetched {} email record(s) for triage", messages.len());
        Ok(messages)
    }

    async fn save_classification(
        &self,
        message_id: i64,
        result: &ClassificationResult,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO classifications (email_id, priority, tags, summary, subject_truncated)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#
        )
        .bind(message_id)
        .bind(result.priority)
        .bind(&result.tags)
        .bind(&result.summary)
        .bind(&result.subject_truncated)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Insert(e.to_string()))?;

        Ok(row.get("id"))
    }

    async fn count_messages(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM emails")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(count.max(0) as usize)
    }
}
