use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::BackendError;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque text-completion service used for triage
#[async_trait]
pub trait ClassificationBackend: Send + Sync {
    /// One blocking request/response exchange, returning the raw text
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;

    fn describe(&self) -> String;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama `/api/generate` client
pub struct OllamaBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(OllamaBackend {
            client,
            config: config.clone(),
        })
    }

    /// List installed models; used as a startup reachability check
    pub async fn check(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.config.url);
        let response = self.client
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.map_error(e, HEALTH_CHECK_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Envelope(e.to_string()))?;

        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        info!("Ollama reachable ({}) with {} model(s)", self.config.url, models.len());
        if !models.iter().any(|m| m == &self.config.model) {
            warn!("⚠️  Model '{}' is not installed on {}", self.config.model, self.config.url);
        }
        Ok(models)
    }

    fn map_error(&self, e: reqwest::Error, timeout: Duration) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(timeout)
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ClassificationBackend for OllamaBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.config.url);
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            format: "json",
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending {} char prompt to {}", prompt.len(), url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Envelope(e.to_string()))?;

        // A missing response field is treated as an empty object
        Ok(envelope.response.unwrap_or_else(|| "{}".to_string()))
    }

    fn describe(&self) -> String {
        format!("ollama {} ({})", self.config.model, self.config.url)
    }
}
