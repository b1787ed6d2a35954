//! seek - semantic knowledge store
//!
//! Text documents are keyed by a unique `service_key`, embedded through an
//! OpenAI-compatible provider and stored in SQLite. Clients reach the store
//! through three MCP tools: `ingest`, `update` and `search`.
//!
//! ## Layout
//!
//! - [`core`]: documents, vector encoding, the SQLite [`VectorStore`]
//! - [`embed`]: the [`Embedder`] trait and the HTTP provider
//! - [`knowledge`]: validated operations returning [`Outcome`] envelopes
//! - [`mcp`]: JSON-RPC dispatcher over stdio
//! - [`cli`]: the `seek` command line

pub mod cli;
pub mod config;
pub mod core;
pub mod embed;
pub mod knowledge;
pub mod mcp;

pub use config::Config;
pub use crate::core::{Document, VectorStore};
pub use embed::{Embedder, OpenAiEmbedder};
pub use knowledge::{InvalidArgument, Knowledge, Outcome};
pub use mcp::run_mcp_server;
