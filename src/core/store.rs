//! VectorStore - SQLite backend for embedded documents
//!
//! # Key Points
//! - One row per `service_key` (UNIQUE constraint + index)
//! - Embedding dimension is fixed per database and recorded in `documents_meta`
//! - Every operation opens its own connection and drops it on return
//! - Each write is a single statement, so content and embedding commit together
//! - Similarity ranking and `LIMIT` run in SQL, the threshold is applied after

use std::path::{Path as FilePath, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use thiserror::Error;

use super::document::{Document, Metadata, Replacement, ScoredDocument};
use super::vector;

/// Errors raised by the store.
///
/// "Not found" is never an error: lookups return `Ok(None)` and
/// `update` returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("service_key '{0}' already exists")]
    DuplicateKey(String),

    #[error("embedding has dimension {actual}, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const SELECT_COLUMNS: &str =
    "id, service_key, content, embedding, metadata, created_at, updated_at";

/// Persistent document store with cosine-similarity search
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    dimension: usize,
}

impl VectorStore {
    /// Open (creating if needed) a store and provision its schema.
    ///
    /// Fails if the database was provisioned with a different dimension.
    pub fn open(path: &FilePath, dimension: usize) -> StoreResult<Self> {
        if dimension == 0 {
            return Err(StoreError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let store = Self {
            path: path.to_path_buf(),
            dimension,
        };

        let conn = store.connect()?;
        Self::init_schema(&conn)?;
        store.check_dimension(&conn)?;

        tracing::debug!(path = %path.display(), dimension, "vector store ready");
        Ok(store)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// A fresh connection for a single operation
    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        vector::register_functions(&conn)?;

        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_key TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT,  -- JSON object
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_service_key ON documents(service_key);

            CREATE TABLE IF NOT EXISTS documents_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn check_dimension(&self, conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO documents_meta (key, value) VALUES ('dimension', ?1)",
            params![self.dimension.to_string()],
        )?;

        let recorded: String = conn.query_row(
            "SELECT value FROM documents_meta WHERE key = 'dimension'",
            [],
            |row| row.get(0),
        )?;

        match recorded.parse::<usize>() {
            Ok(expected) if expected == self.dimension => Ok(()),
            Ok(expected) => Err(StoreError::DimensionMismatch {
                expected,
                actual: self.dimension,
            }),
            Err(_) => Err(StoreError::Storage(rusqlite::Error::InvalidColumnType(
                0,
                "dimension".to_string(),
                rusqlite::types::Type::Text,
            ))),
        }
    }

    fn ensure_dimension(&self, embedding: &[f32]) -> StoreResult<()> {
        if embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    fn metadata_json(metadata: Option<&Metadata>) -> StoreResult<Option<String>> {
        Ok(metadata.map(serde_json::to_string).transpose()?)
    }

    /// Insert a new document and return its id.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the key exists; the existing row is untouched.
    pub fn insert(&self, doc: Replacement<'_>) -> StoreResult<i64> {
        self.ensure_dimension(doc.embedding)?;
        let metadata = Self::metadata_json(doc.metadata)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.connect()?;
        let result = conn.query_row(
            r#"
            INSERT INTO documents (service_key, content, embedding, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING id
            "#,
            params![
                doc.service_key,
                doc.content,
                vector::encode(doc.embedding),
                metadata,
                now
            ],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(id) => {
                tracing::info!(service_key = doc.service_key, id, "document inserted");
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(service_key = doc.service_key, "duplicate service_key on insert");
                Err(StoreError::DuplicateKey(doc.service_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace content, embedding and metadata of an existing document.
    ///
    /// Returns `false` if no document has this key; nothing is created.
    pub fn update(&self, doc: Replacement<'_>) -> StoreResult<bool> {
        self.ensure_dimension(doc.embedding)?;
        let metadata = Self::metadata_json(doc.metadata)?;

        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE documents
            SET content = ?2, embedding = ?3, metadata = ?4, updated_at = ?5
            WHERE service_key = ?1
            "#,
            params![
                doc.service_key,
                doc.content,
                vector::encode(doc.embedding),
                metadata,
                Utc::now().to_rfc3339()
            ],
        )?;

        let found = changed > 0;
        if found {
            tracing::info!(service_key = doc.service_key, "document updated");
        } else {
            tracing::warn!(service_key = doc.service_key, "no document to update");
        }
        Ok(found)
    }

    /// Insert, or overwrite the existing row in place.
    ///
    /// An overwritten row keeps its `id` and `created_at`.
    pub fn upsert(&self, doc: Replacement<'_>) -> StoreResult<i64> {
        self.ensure_dimension(doc.embedding)?;
        let metadata = Self::metadata_json(doc.metadata)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.connect()?;
        let id = conn.query_row(
            r#"
            INSERT INTO documents (service_key, content, embedding, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(service_key) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            params![
                doc.service_key,
                doc.content,
                vector::encode(doc.embedding),
                metadata,
                now
            ],
            |row| row.get::<_, i64>(0),
        )?;

        tracing::info!(service_key = doc.service_key, id, "document upserted");
        Ok(id)
    }

    /// Exact-key lookup
    pub fn get(&self, service_key: &str) -> StoreResult<Option<Document>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM documents WHERE service_key = ?1");

        let doc = conn
            .query_row(&sql, [service_key], Self::row_to_document)
            .optional()?;
        Ok(doc)
    }

    /// Number of stored documents
    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Rank documents by similarity to `query` and return the top `k`.
    ///
    /// With `service_key_filter` only that key is a candidate. `threshold` is
    /// applied to the already-limited top-k window, so fewer than `k` results
    /// can come back even when more documents would clear the threshold.
    pub fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f64>,
        service_key_filter: Option<&str>,
    ) -> StoreResult<Vec<ScoredDocument>> {
        self.ensure_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.connect()?;
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS},
                   1.0 - {distance}(embedding, ?1) AS similarity
            FROM documents
            WHERE (?2 IS NULL OR service_key = ?2)
            ORDER BY similarity DESC, id ASC
            LIMIT ?3
            "#,
            distance = vector::COSINE_DISTANCE,
        );

        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&sql)?;
        let ranked = stmt
            .query_map(
                params![vector::encode(query), service_key_filter, limit],
                |row| {
                    Ok(ScoredDocument {
                        document: Self::row_to_document(row)?,
                        similarity: row.get(7)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let window = ranked.len();
        let results: Vec<ScoredDocument> = match threshold {
            Some(min) => ranked.into_iter().filter(|r| r.similarity >= min).collect(),
            None => ranked,
        };

        tracing::debug!(window, returned = results.len(), "similarity search");
        Ok(results)
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let embedding: Vec<u8> = row.get(3)?;
        let metadata: Option<String> = row.get(4)?;

        let metadata = metadata
            .map(|raw| serde_json::from_str::<Metadata>(&raw))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Document {
            id: row.get(0)?,
            service_key: row.get(1)?,
            content: row.get(2)?,
            embedding: vector::decode(&embedding),
            metadata,
            created_at: parse_timestamp(row, 5)?,
            updated_at: parse_timestamp(row, 6)?,
        })
    }
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn open_store() -> Result<(TempDir, VectorStore)> {
        let dir = tempfile::tempdir()?;
        let store = VectorStore::open(&dir.path().join("kb.db"), DIM)?;
        Ok((dir, store))
    }

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let (_dir, store) = open_store()?;
        let meta = metadata(json!({"team": "payments"}));

        let id = store.insert(
            Replacement::new("svc-a", "hello world", &[1.0, 0.0, 0.0, 0.0])
                .with_metadata(Some(&meta)),
        )?;
        assert!(id > 0);

        let doc = store.get("svc-a")?.expect("document exists");
        assert_eq!(doc.id, id);
        assert_eq!(doc.content, "hello world");
        assert_eq!(doc.embedding, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(doc.metadata, Some(meta));
        assert_eq!(doc.created_at, doc.updated_at);

        assert!(store.get("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_insert_keeps_first_row() -> Result<()> {
        let (_dir, store) = open_store()?;
        let id = store.insert(Replacement::new("svc-a", "first", &[1.0, 0.0, 0.0, 0.0]))?;

        let err = store
            .insert(Replacement::new("svc-a", "second", &[0.0, 1.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(ref key) if key == "svc-a"));

        let doc = store.get("svc-a")?.expect("document exists");
        assert_eq!(doc.id, id);
        assert_eq!(doc.content, "first");
        assert_eq!(store.count()?, 1);
        Ok(())
    }

    #[test]
    fn test_ids_increase() -> Result<()> {
        let (_dir, store) = open_store()?;
        let a = store.insert(Replacement::new("a", "a", &[1.0, 0.0, 0.0, 0.0]))?;
        let b = store.insert(Replacement::new("b", "b", &[0.0, 1.0, 0.0, 0.0]))?;
        assert!(b > a);
        Ok(())
    }

    #[test]
    fn test_update_missing_key_creates_nothing() -> Result<()> {
        let (_dir, store) = open_store()?;
        let found = store.update(Replacement::new("ghost", "boo", &[1.0, 0.0, 0.0, 0.0]))?;
        assert!(!found);
        assert!(store.get("ghost")?.is_none());
        assert_eq!(store.count()?, 0);
        Ok(())
    }

    #[test]
    fn test_update_replaces_every_field() -> Result<()> {
        let (_dir, store) = open_store()?;
        let meta = metadata(json!({"v": 1}));
        store.insert(
            Replacement::new("svc-a", "old", &[1.0, 0.0, 0.0, 0.0]).with_metadata(Some(&meta)),
        )?;

        let found = store.update(Replacement::new("svc-a", "new", &[0.0, 0.0, 1.0, 0.0]))?;
        assert!(found);

        let doc = store.get("svc-a")?.expect("document exists");
        assert_eq!(doc.content, "new");
        assert_eq!(doc.embedding, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(doc.metadata, None);
        assert!(doc.updated_at >= doc.created_at);
        Ok(())
    }

    #[test]
    fn test_upsert_keeps_identity() -> Result<()> {
        let (_dir, store) = open_store()?;
        let first_meta = metadata(json!({"rev": 1}));
        let second_meta = metadata(json!({"rev": 2, "owner": "core"}));

        let first = store.upsert(
            Replacement::new("svc-a", "v1", &[1.0, 0.0, 0.0, 0.0])
                .with_metadata(Some(&first_meta)),
        )?;
        let created_at = store.get("svc-a")?.expect("document exists").created_at;

        let second = store.upsert(
            Replacement::new("svc-a", "v2", &[0.0, 1.0, 0.0, 0.0])
                .with_metadata(Some(&second_meta)),
        )?;
        assert_eq!(first, second);
        assert_eq!(store.count()?, 1);

        let doc = store.get("svc-a")?.expect("document exists");
        assert_eq!(doc.id, first);
        assert_eq!(doc.content, "v2");
        assert_eq!(doc.embedding, vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(doc.metadata, Some(second_meta));
        assert_eq!(doc.created_at, created_at);
        Ok(())
    }

    #[test]
    fn test_writes_refresh_updated_at_only() -> Result<()> {
        let pause = || std::thread::sleep(std::time::Duration::from_millis(20));
        let (_dir, store) = open_store()?;

        store.upsert(Replacement::new("svc-a", "v1", &[1.0, 0.0, 0.0, 0.0]))?;
        let original = store.get("svc-a")?.expect("document exists");

        pause();
        store.upsert(Replacement::new("svc-a", "v2", &[0.0, 1.0, 0.0, 0.0]))?;
        let upserted = store.get("svc-a")?.expect("document exists");
        assert_eq!(upserted.created_at, original.created_at);
        assert!(upserted.updated_at > original.updated_at);

        pause();
        assert!(store.update(Replacement::new("svc-a", "v3", &[0.0, 0.0, 1.0, 0.0]))?);
        let updated = store.get("svc-a")?.expect("document exists");
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at > upserted.updated_at);
        Ok(())
    }

    #[test]
    fn test_wrong_dimension_fails_write() -> Result<()> {
        let (_dir, store) = open_store()?;
        let err = store
            .insert(Replacement::new("svc-a", "short", &[1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        assert_eq!(store.count()?, 0);

        let err = store
            .upsert(Replacement::new("svc-a", "long", &[1.0; 5]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kb.db");
        VectorStore::open(&path, DIM)?;

        let err = VectorStore::open(&path, 8).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 4,
                actual: 8
            }
        ));
        assert!(VectorStore::open(&path, DIM).is_ok());
        Ok(())
    }

    #[test]
    fn test_exact_match_scores_one() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.insert(Replacement::new("exact", "x", &[0.3, 0.1, 0.5, 0.2]))?;
        store.insert(Replacement::new("other", "y", &[0.0, 1.0, 0.0, 0.0]))?;

        let results = store.similarity_search(&[0.3, 0.1, 0.5, 0.2], 1, None, None)?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.service_key, "exact");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_results_are_ordered() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.insert(Replacement::new("a", "a", &[1.0, 0.0, 0.0, 0.0]))?;
        store.insert(Replacement::new("b", "b", &[1.0, 1.0, 0.0, 0.0]))?;
        store.insert(Replacement::new("c", "c", &[0.0, 1.0, 0.0, 0.0]))?;
        store.insert(Replacement::new("d", "d", &[1.0, 0.2, 0.0, 0.0]))?;

        for k in 1..=5 {
            let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], k, None, None)?;
            assert_eq!(results.len(), k.min(4));
            assert!(results
                .windows(2)
                .all(|pair| pair[0].similarity >= pair[1].similarity));
        }

        let all = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 10, None, None)?;
        let keys: Vec<_> = all.iter().map(|r| r.document.service_key.as_str()).collect();
        assert_eq!(keys, ["a", "d", "b", "c"]);
        Ok(())
    }

    #[test]
    fn test_threshold_above_best_match_is_empty() -> Result<()> {
        let (_dir, store) = open_store()?;
        // cos(60°) = 0.5
        store.insert(Replacement::new("half", "h", &[0.5, 0.866_025_4, 0.0, 0.0]))?;

        let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 5, Some(0.99), None)?;
        assert!(results.is_empty());

        let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 5, Some(0.4), None)?;
        assert_eq!(results.len(), 1);
        assert!((results[0].similarity - 0.5).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_threshold_applies_after_limit() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.insert(Replacement::new("best", "b", &[1.0, 0.0, 0.0, 0.0]))?;
        store.insert(Replacement::new("close", "c", &[1.0, 0.1, 0.0, 0.0]))?;

        // Both clear 0.9, but only the top-1 window is considered.
        let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 1, Some(0.9), None)?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.service_key, "best");
        Ok(())
    }

    #[test]
    fn test_service_key_filter() -> Result<()> {
        let (_dir, store) = open_store()?;
        store.insert(Replacement::new("near", "n", &[1.0, 0.0, 0.0, 0.0]))?;
        store.insert(Replacement::new("far", "f", &[0.0, 0.0, 0.0, 1.0]))?;

        let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 10, None, Some("far"))?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.service_key, "far");

        let results = store.similarity_search(&[1.0, 0.0, 0.0, 0.0], 10, None, Some("nope"))?;
        assert!(results.is_empty());
        Ok(())
    }

    #[test]
    fn test_query_dimension_checked() -> Result<()> {
        let (_dir, store) = open_store()?;
        let err = store
            .similarity_search(&[1.0, 0.0], 3, None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_unreachable_database_is_storage_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = VectorStore::open(&dir.path().join("kb.db"), DIM)?;
        let moved = VectorStore {
            path: dir.path().join("missing-dir").join("kb.db"),
            ..store
        };

        let err = moved.get("svc-a").unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        Ok(())
    }
}
