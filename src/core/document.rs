//! Document - the stored unit of knowledge
//!
//! # Key Properties
//! - **id**: assigned by the store, monotonically increasing
//! - **service_key**: external identity, unique across the store
//! - **embedding**: fixed-dimension vector, always written together with `content`
//! - **metadata**: free-form JSON object, replaced wholesale on every write

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form document metadata (a JSON object)
pub type Metadata = Map<String, Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub service_key: String,
    pub content: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a write replaces on a document.
///
/// Insert, update and upsert all take a full `Replacement`; there are no
/// field-level mutators.
#[derive(Debug, Clone, Copy)]
pub struct Replacement<'a> {
    pub service_key: &'a str,
    pub content: &'a str,
    pub embedding: &'a [f32],
    pub metadata: Option<&'a Metadata>,
}

impl<'a> Replacement<'a> {
    pub fn new(service_key: &'a str, content: &'a str, embedding: &'a [f32]) -> Self {
        Self {
            service_key,
            content,
            embedding,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<&'a Metadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A document paired with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// `1 - cosine distance`
    pub similarity: f64,
}
