use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use log::{debug, info, warn};

use crate::config::GmailConfig;
use crate::error::MailboxError;
use crate::mailbox::Mailbox;

const USER_ID: &str = "me";

/// Gmail caps `maxResults` at 500 per page
const PAGE_SIZE: u32 = 500;

pub struct GmailMailbox {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
    query: String,
}

impl GmailMailbox {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        // Read OAuth2 client credentials
        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        // Authenticator with a token cache on disk
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        // HTTPS client for the Gmail hub
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailMailbox {
            hub,
            query: config.query.clone(),
        })
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_ids(&self, limit: Option<usize>) -> Result<Vec<String>, MailboxError> {
        info!("Searching for emails matching '{}'", self.query);

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        // Page through the results until the limit or the last page
        loop {
            let remaining = limit.map(|l| l.saturating_sub(ids.len()));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining
                .map(|r| r.min(PAGE_SIZE as usize) as u32)
                .unwrap_or(PAGE_SIZE);

            let mut call = self.hub
                .users()
                .messages_list(USER_ID)
                .q(&self.query)
                .max_results(page_size)
                .add_scope(google_gmail1::api::Scope::Readonly);
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, page) = call
                .doit()
                .await
                .map_err(|e| MailboxError::Transport(e.to_string()))?;

            ids.extend(page.messages.unwrap_or_default().into_iter().filter_map(|m| m.id));
            debug!("Collected {} message id(s) so far", ids.len());

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            ids.truncate(limit);
        }

        info!("Found {} email(s) matching '{}'", ids.len(), self.query);
        Ok(ids)
    }

    async fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, MailboxError> {
        debug!("Raw email retrieval for ID: {}", id);

        let result = self.hub
            .users()
            .messages_get(USER_ID, id)
            .format("raw")
            .add_scope(google_gmail1::api::Scope::Readonly)
            .doit()
            .await;

        let message = match result {
            Ok((_, msg)) => msg,
            Err(e) => {
                warn!("Error retrieving {} in RAW format: {}", id, e);
                return Err(MailboxError::Transport(e.to_string()));
            }
        };

        // Raw content is already decoded by the API client (RFC822 bytes)
        let raw = message.raw.ok_or_else(|| MailboxError::NotFound(id.to_string()))?;
        debug!("Email {} retrieved, size: {} bytes", id, raw.len());
        Ok(raw)
    }

    fn describe(&self) -> String {
        format!("gmail ({})", self.query)
    }
}
