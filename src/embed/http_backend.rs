//! Ollama HTTP embedding backend

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/api/embed", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            retries: config.retries,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "Embedding backend returned {} for model '{}'",
                response.status(),
                self.model
            )));
        }

        let body: EmbedResponse = response.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Embedding backend returned {} vectors for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        // Vectors within a batch must agree on dimension.
        if let Some(first) = body.embeddings.first() {
            let dimension = first.len();
            if let Some(mismatch) = body.embeddings.iter().find(|v| v.len() != dimension) {
                return Err(Error::Embedding(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    dimension,
                    mismatch.len()
                )));
            }
        }

        Ok(body.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 0..=self.retries {
            match self.request(&texts).await {
                Ok(embeddings) => {
                    debug!(
                        "Embedded {} texts with '{}' (attempt {})",
                        texts.len(),
                        self.model,
                        attempt + 1
                    );
                    return Ok(embeddings);
                }
                Err(err) => {
                    warn!("Embedding attempt {} failed: {}", attempt + 1, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::Embedding("Embedding backend unreachable".to_string())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
