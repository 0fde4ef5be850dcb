use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use crate::error::PublishError;
use crate::publish::{PublishItem, Publisher};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// POSTs each item as JSON to a display store endpoint
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(HttpPublisher {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, item: &PublishItem<'_>) -> Result<(), PublishError> {
        let response = self.client
            .post(&self.url)
            .json(item)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!("✅ Published email {} - Status: {}", item.message_id, status);
            Ok(())
        } else {
            let reason = response.text().await.unwrap_or_default();
            warn!("❌ Publish of email {} rejected - Status: {}", item.message_id, status);
            Err(PublishError::Rejected {
                target: self.url.clone(),
                reason: format!("{}: {}", status, reason),
            })
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
