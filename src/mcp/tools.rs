//! MCP tool argument structs
//!
//! Simple structs for deserializing tool arguments.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::Metadata;
use crate::knowledge::{InvalidArgument, SearchOptions, DEFAULT_K};

/// Tool names in catalog order
pub const TOOL_NAMES: [&str; 3] = ["ingest", "update", "search"];

/// Arguments of `ingest` and `update`
#[derive(Debug, Deserialize)]
pub struct WriteTool {
    /// Unique key of the document
    #[serde(alias = "service_key")]
    pub service_name: String,
    /// Text to embed and store
    pub content: String,
    /// Optional JSON object stored alongside
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Arguments of `search`
#[derive(Debug, Deserialize)]
pub struct SearchTool {
    /// Natural-language query
    pub query: String,
    /// Maximum number of results (default: 10)
    #[serde(default)]
    pub k: Option<i64>,
    /// Minimum similarity, 0.0 to 1.0
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Restrict to one exact key
    #[serde(default, alias = "service_key")]
    pub service_name: Option<String>,
}

impl SearchTool {
    pub fn options(&self) -> SearchOptions<'_> {
        SearchOptions {
            k: self.k.unwrap_or(DEFAULT_K),
            threshold: self.threshold,
            service_key: self.service_name.as_deref(),
        }
    }
}

/// Deserialize tool arguments; a missing or `null` arguments object counts as `{}`
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, InvalidArgument> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args.clone()
    };

    serde_json::from_value(args)
        .map_err(|e| InvalidArgument::new(format!("{} arguments: {}", tool, e)))
}
