//! Update - replace a document, creating it if absent

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::{require_text, Failure, InvalidArgument, Outcome};
use crate::core::{Metadata, Replacement, VectorStore};
use crate::embed::Embedder;

/// Successful update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub message: String,
    pub id: i64,
    pub service_key: String,
    /// `true` when no document existed before this call
    pub created: bool,
}

pub struct Update {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Update {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Upsert: content, embedding and metadata are replaced wholesale.
    pub fn update(
        &self,
        service_key: &str,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Outcome<UpdateReport>, InvalidArgument> {
        let service_key = require_text("service_key", service_key)?;
        require_text("content", content)?;

        tracing::info!(service_key, "updating knowledge");

        let outcome = match self.upsert(service_key, content, metadata) {
            Ok(report) => Outcome::Success(report),
            Err(e) => Outcome::Failure(Failure::new("update knowledge", &e)),
        };
        Ok(outcome)
    }

    fn upsert(
        &self,
        service_key: &str,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<UpdateReport> {
        // Only used to report `created`; the write itself is a single upsert.
        let existing = self.store.get(service_key)?;
        let created = existing.is_none();
        match &existing {
            Some(doc) => tracing::debug!(service_key, id = doc.id, "replacing document"),
            None => tracing::debug!(service_key, "creating document"),
        }

        let embedding = self.embedder.embed(content)?;
        tracing::debug!(dimension = embedding.len(), "embedding created");

        let id = self.store.upsert(
            Replacement::new(service_key, content, &embedding).with_metadata(metadata),
        )?;

        let action = if created { "created" } else { "updated" };
        tracing::info!(service_key, id, action, "update complete");

        Ok(UpdateReport {
            message: format!("Knowledge {} for service_key '{}'", action, service_key),
            id,
            service_key: service_key.to_string(),
            created,
        })
    }
}
