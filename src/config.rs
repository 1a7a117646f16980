// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for codefind
//!
//! Loads configuration from .codefindrc.toml in the indexed root or
//! ~/.config/codefind/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::embedding::chunker::{ChunkConfig, DEFAULT_CHUNK_LINES, DEFAULT_CHUNK_OVERLAP};

/// Name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".codefindrc.toml";

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_PERSIST_DIRECTORY: &str = ".codefind";
pub const DEFAULT_COLLECTION_NAME: &str = "codebase";
pub const DEFAULT_RERANK_MODEL: &str = "bge-reranker-base";

/// Extensions indexed when `[index] extensions` is not set
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "rs", "go", "java", "c", "h", "cpp", "cc",
    "cxx", "hpp", "hh", "rb", "cs", "php", "swift", "kt", "kts", "scala", "lua", "sh", "bash",
    "md", "txt",
];

/// Identity of a collection: everything that must agree between the run
/// that built the index and the session that searches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub embedding_model: String,
    /// Directory under the indexed root holding the store
    pub persist_directory: String,
    pub collection_name: String,
    /// Lines per chunk
    pub chunk_size: usize,
    /// Lines shared by consecutive windows
    pub chunk_overlap: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            persist_directory: DEFAULT_PERSIST_DIRECTORY.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_LINES,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl IndexConfig {
    /// Validated chunker settings for this collection.
    pub fn chunk_config(&self) -> Result<ChunkConfig> {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }

    /// Absolute location of the store for an indexed root.
    pub fn index_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.persist_directory)
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// In-process fastembed model
    #[default]
    Builtin,
    /// External process speaking JSON over stdin/stdout
    Command,
    /// Deterministic feature hashing, no model download
    Hash,
}

/// `[index]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub embedding_model: Option<String>,
    pub persist_directory: Option<String>,
    pub collection_name: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    /// Maximum file size in bytes to index (default: 1MB)
    pub max_file_size: Option<u64>,
    /// Extension allow-list, without the leading dot
    pub extensions: Option<Vec<String>>,
    /// Glob patterns to exclude from indexing
    pub exclude_paths: Vec<String>,
}

impl IndexSettings {
    /// Get max file size (default: 1MB)
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(1024 * 1024)
    }

    pub fn extensions(&self) -> Vec<String> {
        match &self.extensions {
            Some(list) => list
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn exclude_paths(&self) -> &[String] {
        &self.exclude_paths
    }
}

/// `[search]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: Option<usize>,
    /// Weight of the semantic score in hybrid fusion (0.0-1.0)
    pub alpha: Option<f32>,
    pub min_score: Option<f32>,
    /// Whether the BM25 keyword index may be used
    pub keyword: Option<bool>,
    /// Candidates handed to the reranker
    pub rerank_top_k: Option<usize>,
}

impl SearchConfig {
    /// Get result count (defaults to 5)
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(5)
    }

    /// Get fusion weight (defaults to 0.5)
    pub fn alpha(&self) -> f32 {
        self.alpha.unwrap_or(0.5)
    }

    pub fn min_score(&self) -> f32 {
        self.min_score.unwrap_or(0.0)
    }

    pub fn keyword(&self) -> bool {
        self.keyword.unwrap_or(true)
    }

    /// Get rerank candidate count (defaults to 20)
    pub fn rerank_top_k(&self) -> usize {
        self.rerank_top_k.unwrap_or(20)
    }
}

/// `[embeddings]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, hash)
    pub provider: Option<EmbeddingProviderType>,
    /// Command to execute for command provider
    pub command: Option<String>,
    pub batch_size: Option<usize>,
    /// Characters kept per text before embedding
    pub max_chars: Option<usize>,
    /// Vector width of the hash provider
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get batch size; zero means "provider default"
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(0)
    }

    /// Get max chars (defaults to 2000)
    pub fn max_chars(&self) -> usize {
        match self.max_chars {
            Some(0) | None => 2000,
            Some(n) => n,
        }
    }

    /// Get hash dimension (defaults to 256)
    pub fn dimension(&self) -> usize {
        match self.dimension {
            Some(0) | None => 256,
            Some(n) => n,
        }
    }
}

/// `[rerank]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: Option<bool>,
    pub model: Option<String>,
}

impl RerankConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Get model name (defaults to "bge-reranker-base")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_RERANK_MODEL)
    }
}

/// Configuration loaded from .codefindrc.toml or ~/.config/codefind/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index configuration
    pub index: IndexSettings,

    /// Search configuration
    pub search: SearchConfig,

    /// Embedding configuration
    pub embeddings: EmbeddingConfig,

    /// Re-ranking configuration
    pub rerank: RerankConfig,
}

impl Config {
    /// Load configuration for the current directory
    pub fn load() -> Self {
        Self::load_for_dir(Path::new("."))
    }

    /// Load configuration for an indexed root
    ///
    /// Precedence (highest to lowest):
    /// 1. .codefindrc.toml in `dir`
    /// 2. ~/.config/codefind/config.toml
    pub fn load_for_dir(dir: &Path) -> Self {
        if let Some(config) = Self::load_from_path(&dir.join(CONFIG_FILE_NAME)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("codefind").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Collection identity derived from the `[index]` section
    pub fn index_config(&self) -> IndexConfig {
        let defaults = IndexConfig::default();
        let index = &self.index;
        IndexConfig {
            embedding_model: index
                .embedding_model
                .clone()
                .unwrap_or(defaults.embedding_model),
            persist_directory: index
                .persist_directory
                .clone()
                .unwrap_or(defaults.persist_directory),
            collection_name: index
                .collection_name
                .clone()
                .unwrap_or(defaults.collection_name),
            chunk_size: index.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: index.chunk_overlap.unwrap_or(defaults.chunk_overlap),
        }
    }
}
