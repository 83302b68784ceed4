//! Language model completion
//!
//! A trait for completion backends plus an Ollama `/api/generate` client.
//! No streaming; the chain only needs the final text.

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Trait for completion providers
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce a completion for the given prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Completer backed by an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaCompleter {
    client: reqwest::Client,
    url: String,
    model: String,
    retries: u32,
}

impl OllamaCompleter {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            retries: config.retries,
        })
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Model(format!(
                "Model backend returned {} for model '{}'",
                response.status(),
                self.model
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..=self.retries {
            match self.request(prompt).await {
                Ok(text) => {
                    debug!(
                        "Completion from '{}' ({} chars, attempt {})",
                        self.model,
                        text.len(),
                        attempt + 1
                    );
                    return Ok(text);
                }
                Err(err) => {
                    warn!("Completion attempt {} failed: {}", attempt + 1, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Model("Model backend unreachable".to_string())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
