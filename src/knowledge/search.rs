//! Search - semantic lookup over stored documents

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use super::{require_text, Failure, InvalidArgument, Outcome};
use crate::core::{Metadata, ScoredDocument, VectorStore};
use crate::embed::Embedder;

/// Number of results when the caller doesn't ask for a specific `k`
pub const DEFAULT_K: i64 = 10;

/// Optional search parameters
#[derive(Debug, Clone)]
pub struct SearchOptions<'a> {
    /// Must be at least 1
    pub k: i64,
    /// Minimum similarity in `[0, 1]`
    pub threshold: Option<f64>,
    /// Restrict candidates to one exact key
    pub service_key: Option<&'a str>,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            threshold: None,
            service_key: None,
        }
    }
}

/// Client-facing search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub service_key: String,
    pub content: String,
    pub metadata: Option<Metadata>,
    /// Rounded to 4 decimal places
    pub similarity: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ScoredDocument> for SearchHit {
    fn from(scored: ScoredDocument) -> Self {
        let doc = scored.document;
        Self {
            id: doc.id,
            service_key: doc.service_key,
            content: doc.content,
            metadata: doc.metadata,
            similarity: round4(scored.similarity),
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Successful search
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub results: Vec<SearchHit>,
    pub count: usize,
    pub query: String,
}

pub struct Search {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Search {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return the nearest documents.
    ///
    /// A failure outcome still carries `results: []`, `count: 0` and the query.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions<'_>,
    ) -> Result<Outcome<SearchReport>, InvalidArgument> {
        let query = require_text("query", query)?;

        if options.k < 1 {
            return Err(InvalidArgument::new(format!(
                "k must be at least 1 (got {})",
                options.k
            )));
        }

        if let Some(threshold) = options.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(InvalidArgument::new(format!(
                    "threshold must be between 0.0 and 1.0 (got {})",
                    threshold
                )));
            }
        }

        let service_key = options
            .service_key
            .map(str::trim)
            .filter(|key| !key.is_empty());

        tracing::info!(
            query = %preview(query),
            k = options.k,
            threshold = ?options.threshold,
            service_key = ?service_key,
            "searching knowledge"
        );

        let outcome = match self.run(query, options.k, options.threshold, service_key) {
            Ok(report) => Outcome::Success(report),
            Err(e) => Outcome::Failure(
                Failure::new("search knowledge", &e)
                    .with_context("results", json!([]))
                    .with_context("count", json!(0))
                    .with_context("query", json!(query)),
            ),
        };
        Ok(outcome)
    }

    fn run(
        &self,
        query: &str,
        k: i64,
        threshold: Option<f64>,
        service_key: Option<&str>,
    ) -> Result<SearchReport> {
        let embedding = self.embedder.embed(query)?;
        tracing::debug!(dimension = embedding.len(), "query embedding created");

        let k = usize::try_from(k)?;
        let results: Vec<SearchHit> = self
            .store
            .similarity_search(&embedding, k, threshold, service_key)?
            .into_iter()
            .map(SearchHit::from)
            .collect();

        tracing::info!(count = results.len(), "search complete");

        Ok(SearchReport {
            count: results.len(),
            results,
            query: query.to_string(),
        })
    }
}

/// First 50 chars, for logs
fn preview(query: &str) -> String {
    match query.char_indices().nth(50) {
        Some((idx, _)) => format!("{}...", &query[..idx]),
        None => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Replacement;
    use crate::knowledge::testing::{WordEmbedder, DIM};
    use tempfile::TempDir;

    fn setup() -> anyhow::Result<(TempDir, Arc<VectorStore>, Arc<WordEmbedder>, Search)> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(VectorStore::open(&dir.path().join("kb.db"), DIM)?);
        let embedder = Arc::new(WordEmbedder::new());
        let search = Search::new(Arc::clone(&store), embedder.clone());
        Ok((dir, store, embedder, search))
    }

    fn put(store: &VectorStore, embedder: &WordEmbedder, key: &str, content: &str) -> anyhow::Result<()> {
        let embedding = embedder.embed(content)?;
        store.insert(Replacement::new(key, content, &embedding))?;
        Ok(())
    }

    #[test]
    fn test_search_returns_flattened_hits() -> anyhow::Result<()> {
        let (_dir, store, embedder, search) = setup()?;
        put(&store, &embedder, "svc-a", "hello world")?;
        put(&store, &embedder, "svc-b", "payment gateway retries")?;

        let outcome = search.search("  hello world ", &SearchOptions { k: 5, ..Default::default() })?;
        let report = outcome.success().expect("search succeeds");
        assert_eq!(report.query, "hello world");
        assert_eq!(report.count, report.results.len());
        assert_eq!(report.results[0].service_key, "svc-a");
        assert_eq!(report.results[0].similarity, 1.0);
        assert!(report
            .results
            .windows(2)
            .all(|pair| pair[0].similarity >= pair[1].similarity));

        let value = serde_json::to_value(&outcome)?;
        assert_eq!(value["success"], json!(true));
        assert!(value["results"][0]["created_at"].is_string());
        assert!(value["results"][0].get("embedding").is_none());
        Ok(())
    }

    #[test]
    fn test_validation_errors_propagate() -> anyhow::Result<()> {
        let (_dir, _store, _embedder, search) = setup()?;

        assert!(search.search(" ", &SearchOptions::default()).is_err());
        assert!(search
            .search("q", &SearchOptions { k: 0, ..Default::default() })
            .is_err());
        assert!(search
            .search("q", &SearchOptions { threshold: Some(1.5), ..Default::default() })
            .is_err());
        assert!(search
            .search("q", &SearchOptions { threshold: Some(-0.1), ..Default::default() })
            .is_err());
        assert!(search
            .search("q", &SearchOptions { threshold: Some(f64::NAN), ..Default::default() })
            .is_err());
        Ok(())
    }

    #[test]
    fn test_filter_and_threshold() -> anyhow::Result<()> {
        let (_dir, store, embedder, search) = setup()?;
        put(&store, &embedder, "svc-a", "hello world")?;
        put(&store, &embedder, "svc-b", "hello there")?;

        let options = SearchOptions {
            service_key: Some(" svc-b "),
            ..Default::default()
        };
        let outcome = search.search("hello world", &options)?;
        let report = outcome.success().expect("search succeeds");
        assert_eq!(report.count, 1);
        assert_eq!(report.results[0].service_key, "svc-b");

        let options = SearchOptions {
            threshold: Some(0.99),
            ..Default::default()
        };
        let outcome = search.search("completely unrelated words", &options)?;
        assert_eq!(outcome.success().map(|r| r.count), Some(0));
        Ok(())
    }

    #[test]
    fn test_provider_failure_keeps_result_shape() -> anyhow::Result<()> {
        let (_dir, _store, embedder, search) = setup()?;
        embedder.set_failing(true);

        let outcome = search.search(" hello ", &SearchOptions::default())?;
        let value = serde_json::to_value(&outcome)?;
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["results"], json!([]));
        assert_eq!(value["count"], json!(0));
        assert_eq!(value["query"], json!("hello"));
        assert!(value["error"]
            .as_str()
            .is_some_and(|e| e.contains("unavailable")));
        Ok(())
    }

    #[test]
    fn test_rounding_and_preview() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(0.99999), 1.0);
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(60)), format!("{}...", "x".repeat(50)));
    }
}
