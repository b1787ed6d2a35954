//! MCP (Model Context Protocol) Server
//!
//! Exposes the knowledge store to AI clients over stdio.
//!
//! # Tools
//! - `ingest` - Store a new document under a unique key
//! - `update` - Replace (or create) the document for a key
//! - `search` - Semantic search by cosine similarity

mod catalog;
mod jsonrpc;
mod server;
mod tools;

pub use catalog::ToolCatalog;
pub use jsonrpc::{Incoming, JsonRpcError, JsonRpcResponse};
pub use server::{build_server, run_mcp_server, McpServer, SessionState};
pub use tools::TOOL_NAMES;
