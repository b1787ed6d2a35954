//! Ingest - store a new document

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{require_text, Failure, InvalidArgument, Outcome};
use crate::core::{Metadata, Replacement, VectorStore};
use crate::embed::Embedder;

/// Successful ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub message: String,
    pub id: i64,
    pub service_key: String,
}

/// One entry of a batch ingest
#[derive(Debug, Clone, Deserialize)]
pub struct IngestItem {
    #[serde(alias = "service_name")]
    pub service_key: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

pub struct Ingest {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Ingest {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embed `content` and insert it under `service_key`.
    ///
    /// An existing key is reported as a failure outcome, not overwritten.
    pub fn ingest(
        &self,
        service_key: &str,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Outcome<IngestReport>, InvalidArgument> {
        let service_key = require_text("service_key", service_key)?;
        require_text("content", content)?;

        tracing::info!(service_key, "ingesting knowledge");

        let outcome = match self.embed_and_insert(service_key, content, metadata) {
            Ok(report) => Outcome::Success(report),
            Err(e) => Outcome::Failure(Failure::new("ingest knowledge", &e)),
        };
        Ok(outcome)
    }

    fn embed_and_insert(
        &self,
        service_key: &str,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<IngestReport> {
        let embedding = self.embedder.embed(content)?;
        tracing::debug!(dimension = embedding.len(), "embedding created");
        self.insert(service_key, content, &embedding, metadata)
    }

    fn insert(
        &self,
        service_key: &str,
        content: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<IngestReport> {
        let id = self.store.insert(
            Replacement::new(service_key, content, embedding).with_metadata(metadata),
        )?;

        Ok(IngestReport {
            message: format!("Knowledge ingested for service_key '{}'", service_key),
            id,
            service_key: service_key.to_string(),
        })
    }

    /// Ingest many documents with a single batched embedding call.
    ///
    /// Every item is validated before anything is embedded; one invalid item
    /// rejects the whole batch. After that each item gets its own outcome.
    pub fn ingest_batch(
        &self,
        items: &[IngestItem],
    ) -> Result<Vec<Outcome<IngestReport>>, InvalidArgument> {
        let mut keys = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let key = require_text("service_key", &item.service_key)
                .and_then(|key| require_text("content", &item.content).map(|_| key))
                .map_err(|e| InvalidArgument::new(format!("item {}: {}", index, e.0)))?;
            keys.push(key);
        }

        if items.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(items = items.len(), "ingesting batch");

        let texts: Vec<&str> = items.iter().map(|item| item.content.as_str()).collect();
        let embeddings = match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == items.len() => vectors,
            Ok(vectors) => {
                let e = anyhow::anyhow!(
                    "embedding provider returned {} vectors for {} inputs",
                    vectors.len(),
                    items.len()
                );
                return Ok(items
                    .iter()
                    .map(|_| Outcome::Failure(Failure::new("ingest knowledge", &e)))
                    .collect());
            }
            Err(e) => {
                return Ok(items
                    .iter()
                    .map(|_| Outcome::Failure(Failure::new("ingest knowledge", &e)))
                    .collect());
            }
        };

        let outcomes = items
            .iter()
            .zip(keys)
            .zip(&embeddings)
            .map(|((item, key), embedding)| {
                match self.insert(key, &item.content, embedding, item.metadata.as_ref()) {
                    Ok(report) => Outcome::Success(report),
                    Err(e) => Outcome::Failure(Failure::new("ingest knowledge", &e)),
                }
            })
            .collect();

        Ok(outcomes)
    }
}
