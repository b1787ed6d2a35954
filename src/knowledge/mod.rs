//! Knowledge operations - ingest, update and search
//!
//! Each operation validates its input, embeds text through the [`Embedder`]
//! and calls the [`VectorStore`].
//!
//! Errors come in two tiers:
//! - [`InvalidArgument`] is returned as `Err` and propagates to the caller.
//! - Anything that fails after validation (embedding provider, duplicate key,
//!   storage) is captured into [`Outcome::Failure`], which is an `Ok` value.

mod ingest;
mod search;
mod update;

pub use ingest::{Ingest, IngestItem, IngestReport};
pub use search::{Search, SearchHit, SearchOptions, SearchReport, DEFAULT_K};
pub use update::{Update, UpdateReport};

use std::sync::Arc;

use anyhow::Context;
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::core::VectorStore;
use crate::embed::{Embedder, OpenAiEmbedder};

/// Precondition failure. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub String);

impl InvalidArgument {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a knowledge operation that passed validation.
///
/// Serializes as `{"success": true, ...report}` or
/// `{"success": false, "message": .., "error": .., ...context}`.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Success(report) => Some(report),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}

#[derive(serde::Serialize)]
struct Tagged<'a, B: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: &'a B,
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Success(body) => Tagged {
                success: true,
                body,
            }
            .serialize(serializer),
            Outcome::Failure(body) => Tagged {
                success: false,
                body,
            }
            .serialize(serializer),
        }
    }
}

/// A captured downstream failure
#[derive(Debug, Clone, serde::Serialize)]
pub struct Failure {
    pub message: String,
    pub error: String,
    /// Extra fields merged into the envelope (e.g. empty search results)
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl Failure {
    /// `action` completes "Failed to ..."
    pub fn new(action: &str, err: &anyhow::Error) -> Self {
        let error = format!("{:#}", err);
        tracing::error!(error = %error, "failed to {}", action);
        Self {
            message: format!("Failed to {}: {}", action, error),
            error,
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

/// Reject empty or whitespace-only text, returning it trimmed
pub(crate) fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, InvalidArgument> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::error!(field, "rejected empty argument");
        return Err(InvalidArgument::new(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

/// The three operations sharing one store and one embedder
pub struct Knowledge {
    pub ingest: Ingest,
    pub update: Update,
    pub search: Search,
}

impl Knowledge {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
        let store = Arc::new(store);
        Self {
            ingest: Ingest::new(Arc::clone(&store), Arc::clone(&embedder)),
            update: Update::new(Arc::clone(&store), Arc::clone(&embedder)),
            search: Search::new(store, embedder),
        }
    }

    /// Open the configured database with the OpenAI-compatible embedder.
    ///
    /// Creates the database (and its directory) when missing.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let store = VectorStore::open(&db_path, config.database.dimension)
            .with_context(|| format!("Failed to open knowledge store at {}", db_path.display()))?;

        let embedder = OpenAiEmbedder::from_config(&config.embedding, config.database.dimension)?;
        if config.embedding.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; embedding calls will fail");
        }

        Ok(Self::new(store, Arc::new(embedder)))
    }
}
