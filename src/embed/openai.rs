//! OpenAI-compatible embeddings client (blocking)

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use super::Embedder;
use crate::config::EmbeddingConfig;

/// Blocking client for `POST {base_url}/embeddings`
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Create client from config.
    ///
    /// A missing API key is not an error here; every embed call fails instead,
    /// so the server can still start and answer protocol requests.
    pub fn from_config(config: &EmbeddingConfig, dimensions: usize) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            config.api_key.clone(),
            Some(dimensions),
            Duration::from_secs(config.timeout_secs),
            config.batch_size,
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        dimensions: Option<usize>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(batch_size > 0, "embedding batch_size must be positive");

        let endpoint = Url::parse(&format!("{}/embeddings", base_url.trim_end_matches('/')))
            .with_context(|| format!("invalid embedding base_url: {}", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            dimensions,
            batch_size,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one request of at most `batch_size` inputs
    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY is not configured")?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .context("invalid OpenAI API key")?;

        let payload = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        tracing::debug!(inputs = inputs.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&payload)
            .send()
            .context("Failed to send embeddings request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Embeddings API error ({}): {}", status, body);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .context("Failed to parse embeddings response")?;
        parsed.data.sort_by_key(|entry| entry.index);

        anyhow::ensure!(
            parsed.data.len() == inputs.len(),
            "embeddings API returned {} vectors for {} inputs",
            parsed.data.len(),
            inputs.len()
        );

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text])?;
        let vector = vectors.pop().context("embeddings API returned no vector")?;
        tracing::debug!(chars = text.len(), dimension = vector.len(), "embedding created");
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.request(chunk)?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
