//! Core module - storage layer
//!
//! Documents, the embedding codec and the SQLite-backed vector store.

pub mod document;
pub mod store;
pub mod vector;

pub use document::{Document, Metadata, Replacement, ScoredDocument};
pub use store::{StoreError, StoreResult, VectorStore};
