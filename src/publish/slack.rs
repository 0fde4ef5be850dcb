use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use slack_morphism::prelude::*;

use crate::config::SlackConfig;
use crate::error::PublishError;
use crate::publish::{priority_label, PublishItem, Publisher};

pub struct SlackPublisher {
    client: SlackClient<SlackClientHyperHttpsConnector>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
}

impl SlackPublisher {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initializing Slack publisher");

        let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
        let token = SlackApiToken::new(config.bot_token.clone().into());
        let channel_id = SlackChannelId::new(config.channel_id.clone());

        Ok(SlackPublisher {
            client,
            token,
            channel_id,
        })
    }

    /// Send a free-form message (run summaries, errors)
    pub async fn send_message(&self, text: &str) -> Result<(), PublishError> {
        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(text.to_string()),
        );

        let session = self.client.open_session(&self.token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                info!("✅ Slack message sent: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Error sending Slack message: {}", e);
                Err(PublishError::Rejected {
                    target: "slack".to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Slack mrkdwn rendering of a classified email
pub fn format_item(item: &PublishItem<'_>) -> String {
    let result = item.result;
    let mut text = format!(
        "📬 *[P{} {}]* {}\n",
        result.priority,
        priority_label(result.priority),
        result.subject_truncated
    );

    if !result.summary.is_empty() {
        text.push_str(&format!("> {}\n", result.summary));
    }

    if !result.tags.is_empty() {
        let tags: Vec<String> = result.tags.iter().map(|t| format!("`{}`", t)).collect();
        text.push_str(&format!("• Tags: {}\n", tags.join(" ")));
    }

    text.push_str(&format!("• Email ID: `{}`", item.message_id));
    text
}

#[async_trait]
impl Publisher for SlackPublisher {
    async fn publish(&self, item: &PublishItem<'_>) -> Result<(), PublishError> {
        info!("Publishing email {} to Slack", item.message_id);
        self.send_message(&format_item(item)).await
    }

    async fn notify_failure(&self, text: &str) -> Result<(), PublishError> {
        info!("Sending Slack error notification");
        self.send_message(&format!("❌ *Notifly run failed*\n```{}```", text)).await
    }

    fn name(&self) -> &str {
        "slack"
    }
}
