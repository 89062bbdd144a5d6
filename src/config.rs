//! Configuration module for hadith search.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HS_` and use double underscores
//! to separate nested levels:
//! - `HS_CORPUS__DIR=/data/LK-Hadith-Corpus` sets `corpus.dir`
//! - `HS_SEARCH__DEFAULT_LIMIT=10` sets `search.default_limit`
//! - `HS_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::corpus::columns;

/// Directory holding settings and, by default, index artifacts.
pub const CONFIG_DIR: &str = ".hadith";

/// Records sent to the embedding model per call.
pub const DEFAULT_BATCH_SIZE: usize = 256;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Where records come from
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Where index artifacts live
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorpusConfig {
    /// Directory searched recursively for `*.csv` files
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,

    /// Positional names of the CSV fields
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Column holding the text that gets embedded
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// Whether the first row of each file is a header
    #[serde(default = "default_true")]
    pub has_headers: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Persisted vector index file
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Cached corpus embeddings, reused across index rebuilds
    #[serde(default = "default_embedding_cache")]
    pub embedding_cache: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Directory where downloaded model files are cached
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Texts per embedding batch while building
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Show model download progress
    #[serde(default = "default_false")]
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Results returned when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on any requested limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Deadline for embedding a query, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_corpus_dir() -> PathBuf {
    PathBuf::from("LK-Hadith-Corpus")
}
fn default_columns() -> Vec<String> {
    columns::ALL.iter().map(|c| c.to_string()).collect()
}
fn default_text_column() -> String {
    columns::ENGLISH_HADITH.to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index/hadith.vec")
}
fn default_embedding_cache() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index/embeddings.vec")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("hadith-search").join("models"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models"))
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_limit() -> usize {
    5
}
fn default_max_limit() -> usize {
    100
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            corpus: CorpusConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
            columns: default_columns(),
            text_column: default_text_column(),
            has_headers: true,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            embedding_cache: default_embedding_cache(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            models_dir: default_models_dir(),
            batch_size: default_batch_size(),
            show_progress: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

impl SearchConfig {
    /// Query embedding deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Applies the default to a missing limit and caps it at `max_limit`.
    #[must_use]
    pub fn resolve_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration layered on a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let settings: Self = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscore
            // stays inside field names
            .merge(Env::prefixed("HS_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), Box<figment::Error>> {
        if self.embedding.batch_size == 0 {
            return Err(Box::new(figment::Error::from(
                "embedding.batch_size must be at least 1".to_string(),
            )));
        }
        Ok(())
    }

    /// Find the settings file by looking for a `.hadith` directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# Hadith Search Configuration File

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

[corpus]
# Directory searched recursively for *.csv files (sorted by path)
dir = "{corpus_dir}"

# Column holding the text that gets embedded
text_column = "English_Hadith"

# Whether the first row of each file is a header
has_headers = true

[index]
# Persisted vector index
path = "{index_path}"

# Cached corpus embeddings
embedding_cache = "{embedding_cache}"

[embedding]
# Model to use for embeddings
model = "AllMiniLML6V2"

# Texts per embedding batch while building
batch_size = 256

[search]
# Results returned when no limit is given
default_limit = 5

# Upper bound on any requested limit
max_limit = 100

# Deadline for embedding a query, in milliseconds
timeout_ms = 5000

[server]
# HTTP server bind address
bind = "127.0.0.1:5000"
"#,
            corpus_dir = default_corpus_dir().display(),
            index_path = default_index_path().display(),
            embedding_cache = default_embedding_cache().display(),
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
