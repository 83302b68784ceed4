//! Configuration management for ragdesk
//!
//! Handles loading and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model backend configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Relational database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Response formatting configuration
    #[serde(default)]
    pub format: FormatConfig,

    /// Insight generation configuration
    #[serde(default)]
    pub insights: InsightsConfig,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_retrieval_k")]
    pub k: usize,

    /// Minimum similarity score (0.0 - 1.0) for retrieved chunks
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_retrieval_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend base URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries on transient failure
    #[serde(default = "default_embedding_retries")]
    pub retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            retries: default_embedding_retries(),
        }
    }
}

/// Language model backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend base URL
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Retries on transient failure
    #[serde(default = "default_model_retries")]
    pub retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            model: default_model_name(),
            timeout_secs: default_model_timeout(),
            retries: default_model_retries(),
        }
    }
}

/// Relational database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (postgres://...); may also come from --database-url
    #[serde(default)]
    pub url: Option<String>,

    /// Minimum pool connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Row batch size when streaming table contents
    #[serde(default = "default_row_batch_size")]
    pub batch_size: usize,

    /// Per-query timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            batch_size: default_row_batch_size(),
            timeout_secs: default_query_timeout(),
        }
    }
}

/// Response formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Return only the first line of a model response
    #[serde(default = "default_first_line_only")]
    pub first_line_only: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            first_line_only: default_first_line_only(),
        }
    }
}

/// Insight generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Rows sampled per table
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            sample_rows: default_sample_rows(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragdesk")
            .join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.chunk_overlap >= self.chunk.chunk_size {
            return Err(Error::Config(
                "chunk.chunk_overlap must be < chunk.chunk_size".to_string(),
            ));
        }

        if self.retrieval.k == 0 {
            return Err(Error::Config("retrieval.k must be positive".to_string()));
        }

        if self.retrieval.score_threshold < 0.0 || self.retrieval.score_threshold > 1.0 {
            return Err(Error::Config(
                "retrieval.score_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(Error::Config(
                "database.min_connections must be <= database.max_connections (and max > 0)"
                    .to_string(),
            ));
        }

        if self.database.batch_size == 0 {
            return Err(Error::Config(
                "database.batch_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk.chunk_size, 1024);
        assert_eq!(config.chunk.chunk_overlap, 100);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.score_threshold, 0.5);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.format.first_line_only);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunk.chunk_overlap = config.chunk.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[chunk]\nchunk_size = 512\n").unwrap();
        assert_eq!(config.chunk.chunk_size, 512);
        assert_eq!(config.chunk.chunk_overlap, 100);
        assert_eq!(config.model.model, "mistral");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nk = 5\n\n[model]\nmodel = \"llama3\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.model.model, "llama3");
        assert_eq!(config.chunk.chunk_size, 1024);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nk = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = Config::default();
        config.retrieval.score_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
