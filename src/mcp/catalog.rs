//! Tool schema catalog
//!
//! `tools/list` serves schema documents that live outside the dispatcher code.
//! The catalog is built once (bundled defaults or a directory of
//! `<tool>.json` files) and injected into the server. A missing or corrupt
//! document drops only that tool from the listing.

use std::path::Path;

use serde_json::Value;

use super::tools::TOOL_NAMES;

const BUNDLED: [(&str, &str); 3] = [
    ("ingest", include_str!("../../schemas/ingest.json")),
    ("update", include_str!("../../schemas/update.json")),
    ("search", include_str!("../../schemas/search.json")),
];

/// Optional file in a schema directory naming the catalog version
const VERSION_FILE: &str = "VERSION";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    schema: Result<Value, String>,
}

/// Versioned map of tool name to schema document
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    version: String,
    entries: Vec<Entry>,
}

impl ToolCatalog {
    /// Schemas compiled into the binary
    pub fn bundled() -> Self {
        Self::from_documents(
            env!("CARGO_PKG_VERSION"),
            BUNDLED.iter().map(|(name, text)| (*name, Some(*text))),
        )
    }

    /// Read `<dir>/<tool>.json` for every tool
    pub fn from_dir(dir: &Path) -> Self {
        let version = std::fs::read_to_string(dir.join(VERSION_FILE))
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|_| "unversioned".to_string());

        let entries = TOOL_NAMES
            .iter()
            .map(|name| {
                let path = dir.join(format!("{}.json", name));
                let schema = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))
                    .and_then(|text| parse_document(name, &text));
                Entry {
                    name: name.to_string(),
                    schema,
                }
            })
            .collect();

        let catalog = Self { version, entries };
        catalog.log_loaded();
        catalog
    }

    /// Build from `(tool, document text)` pairs; `None` marks a missing document
    pub fn from_documents<'a>(
        version: &str,
        documents: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    ) -> Self {
        let entries = documents
            .into_iter()
            .map(|(name, text)| Entry {
                name: name.to_string(),
                schema: text
                    .ok_or_else(|| "schema document missing".to_string())
                    .and_then(|text| parse_document(name, text)),
            })
            .collect();

        let catalog = Self {
            version: version.to_string(),
            entries,
        };
        catalog.log_loaded();
        catalog
    }

    fn log_loaded(&self) {
        let available = self.entries.iter().filter(|e| e.schema.is_ok()).count();
        tracing::info!(
            version = %self.version,
            available,
            total = self.entries.len(),
            "tool catalog loaded"
        );
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Schemas for `tools/list`. Broken entries are skipped and logged.
    pub fn list(&self) -> Vec<Value> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.schema {
                Ok(schema) => Some(schema.clone()),
                Err(reason) => {
                    tracing::warn!(tool = %entry.name, %reason, "tool omitted from listing");
                    None
                }
            })
            .collect()
    }

    /// Tools that could not be loaded, with the reason
    pub fn omitted(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.schema {
                Ok(_) => None,
                Err(reason) => Some((entry.name.as_str(), reason.as_str())),
            })
            .collect()
    }
}

/// A usable document is an object naming this tool with an `inputSchema` object
fn parse_document(tool: &str, text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;

    match value.get("name").and_then(Value::as_str) {
        Some(name) if name == tool => {}
        Some(name) => return Err(format!("document names tool '{}'", name)),
        None => return Err("document has no name".to_string()),
    }

    if !value.get("inputSchema").is_some_and(Value::is_object) {
        return Err("document has no inputSchema object".to_string());
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tools: &[Value]) -> Vec<&str> {
        tools.iter().filter_map(|t| t["name"].as_str()).collect()
    }

    #[test]
    fn test_bundled_catalog_is_complete() {
        let catalog = ToolCatalog::bundled();
        assert_eq!(names(&catalog.list()), TOOL_NAMES);
        assert!(catalog.omitted().is_empty());
        assert_eq!(catalog.version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_corrupt_document_is_omitted() {
        let catalog = ToolCatalog::from_documents(
            "test",
            [
                ("ingest", Some(BUNDLED[0].1)),
                ("update", Some("{ not json")),
                ("search", None),
            ],
        );
        assert_eq!(names(&catalog.list()), ["ingest"]);

        let omitted = catalog.omitted();
        assert_eq!(omitted.len(), 2);
        assert_eq!(omitted[0].0, "update");
        assert!(omitted[0].1.starts_with("invalid JSON"));
        assert_eq!(omitted[1], ("search", "schema document missing"));
    }

    #[test]
    fn test_document_must_describe_its_tool() {
        assert!(parse_document("search", BUNDLED[0].1).is_err());
        assert!(parse_document("search", r#"{"name": "search"}"#).is_err());
        assert!(parse_document("search", r#"{"name": "search", "inputSchema": {}}"#).is_ok());
    }

    #[test]
    fn test_from_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ingest.json"), BUNDLED[0].1)?;
        std::fs::write(dir.path().join("search.json"), BUNDLED[2].1)?;
        std::fs::write(dir.path().join(VERSION_FILE), "2\n")?;

        let catalog = ToolCatalog::from_dir(dir.path());
        assert_eq!(catalog.version(), "2");
        assert_eq!(names(&catalog.list()), ["ingest", "search"]);
        assert_eq!(catalog.omitted()[0].0, "update");
        Ok(())
    }
}
