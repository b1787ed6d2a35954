//! Configuration module
//!
//! Config is read from TOML. Lookup order:
//! 1. Explicit path (`--config` / `SEEK_CONFIG`)
//! 2. Local `.seek/config.toml` (walking up from CWD)
//! 3. Global `~/.seek/config.toml`
//! 4. Built-in defaults
//!
//! A few environment variables override file values, see [`Config::apply_env`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-project directory holding config and database
pub const SEEK_DIR: &str = ".seek";
pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_FILE: &str = "knowledge.db";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. Resolved by [`Config::database_path`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Embedding dimension shared by every stored document
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root, `/embeddings` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefer `OPENAI_API_KEY` over storing the key here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max inputs per embeddings request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

/// Identity reported to MCP clients during the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            protocol_version: default_protocol_version(),
        }
    }
}

fn default_server_name() -> String {
    "seek".to_string()
}

fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// Directory with `ingest.json`, `update.json`, `search.json`.
    /// Bundled schemas are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_dir: Option<PathBuf>,
}

impl Config {
    /// Load config from an explicit path or the default locations,
    /// then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => Self::discover()?,
        };
        config.apply_env();
        Ok(config)
    }

    fn discover() -> Result<Self> {
        if let Some(local) = Self::find_local(CONFIG_FILE) {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_path(CONFIG_FILE) {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment variables win over file values
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("SEEK_DATABASE") {
            if !path.trim().is_empty() {
                self.database.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.embedding.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENAI_EMBEDDING_MODEL") {
            if !model.trim().is_empty() {
                self.embedding.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.embedding.base_url = base_url;
            }
        }
    }

    /// Database path with priority:
    /// 1. `[database].path` (or `SEEK_DATABASE`, already applied)
    /// 2. Local `.seek/knowledge.db` (walking up from CWD)
    /// 3. Local `.seek/` directory without a database yet
    /// 4. Global `~/.seek/knowledge.db`
    /// 5. `.seek/knowledge.db` relative to CWD
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }

        if let Some(local_db) = Self::find_local(DATABASE_FILE) {
            return local_db;
        }

        if let Some(local_dir) = Self::find_local_dir() {
            return local_dir.join(DATABASE_FILE);
        }

        if let Some(global) = Self::global_path(DATABASE_FILE) {
            return global;
        }

        PathBuf::from(SEEK_DIR).join(DATABASE_FILE)
    }

    /// Find `.seek/<file>` walking up directories
    fn find_local(file: &str) -> Option<PathBuf> {
        Self::find_local_dir()
            .map(|dir| dir.join(file))
            .filter(|path| path.exists())
    }

    fn find_local_dir() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let dir = current.join(SEEK_DIR);
            if dir.is_dir() {
                return Some(dir);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// `~/.seek/<file>`
    fn global_path(file: &str) -> Option<PathBuf> {
        directories::UserDirs::new().map(|u| u.home_dir().join(SEEK_DIR).join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() -> Result<()> {
        let config: Config = toml::from_str("[embedding]\nmodel = \"custom\"\n")?;
        assert_eq!(config.embedding.model, "custom");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.database.dimension, 1536);
        assert_eq!(config.server.protocol_version, "2024-11-05");
        assert!(config.tools.schema_dir.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_load_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.database.dimension = 8;
        config.database.path = Some(dir.path().join("kb.db"));
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.database.dimension, 8);
        assert_eq!(loaded.database_path(), dir.path().join("kb.db"));
        Ok(())
    }

    #[test]
    fn test_invalid_toml_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[database\n")?;

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
        Ok(())
    }
}
