use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clippings::ClippingsFormat;
use crate::semantic::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONNECTION_THRESHOLD, DEFAULT_MODEL, DEFAULT_PAIRWISE_WINDOW,
    DEFAULT_REPRESENTATIVE_COUNT, DEFAULT_TOP_K,
};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding timeout in seconds
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 600;
/// Default number of connections printed
const DEFAULT_CONNECTION_DISPLAY_COUNT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("{field} {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Configuration for embeddings and similarity queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2"), or "hash"
    #[serde(default = "default_model")]
    pub model: String,

    /// Texts per inference batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Give up on computing embeddings after this many seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,

    /// Results returned by a similarity search when --top-k is not given
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Representative highlights shown per book
    #[serde(default = "default_representative_count")]
    pub representative_count: usize,

    /// Minimum similarity for a cross-book connection [-1.0, 1.0]
    #[serde(default = "default_connection_threshold")]
    pub connection_threshold: f32,

    /// Connections printed
    #[serde(default = "default_connection_display_count")]
    pub connection_display_count: usize,

    /// Rows per work unit in the pairwise connection sweep
    #[serde(default = "default_pairwise_window")]
    pub pairwise_window: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            batch_size: default_batch_size(),
            embedding_timeout_secs: default_embedding_timeout_secs(),
            default_top_k: default_top_k(),
            representative_count: default_representative_count(),
            connection_threshold: default_connection_threshold(),
            connection_display_count: default_connection_display_count(),
            pairwise_window: default_pairwise_window(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_embedding_timeout_secs() -> u64 {
    DEFAULT_EMBEDDING_TIMEOUT_SECS
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_representative_count() -> usize {
    DEFAULT_REPRESENTATIVE_COUNT
}

fn default_connection_threshold() -> f32 {
    DEFAULT_CONNECTION_THRESHOLD
}

fn default_connection_display_count() -> usize {
    DEFAULT_CONNECTION_DISPLAY_COUNT
}

fn default_pairwise_window() -> usize {
    DEFAULT_PAIRWISE_WINDOW
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clippings: ClippingsFormat,
    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clip = &self.clippings;
        if clip.delimiter_chars.is_empty() {
            return Err(ConfigError::invalid(
                "clippings.delimiter_chars",
                "must contain at least one character",
            ));
        }
        if clip.delimiter_min_len == 0 {
            return Err(ConfigError::invalid(
                "clippings.delimiter_min_len",
                "must be greater than 0",
            ));
        }
        if clip.date_formats.is_empty() {
            return Err(ConfigError::invalid(
                "clippings.date_formats",
                "must list at least one format",
            ));
        }

        let sem = &self.semantic;
        if !(-1.0..=1.0).contains(&sem.connection_threshold) {
            return Err(ConfigError::invalid(
                "semantic.connection_threshold",
                format!("must be between -1.0 and 1.0, got {}", sem.connection_threshold),
            ));
        }

        let counts = [
            ("semantic.batch_size", sem.batch_size),
            ("semantic.default_top_k", sem.default_top_k),
            ("semantic.representative_count", sem.representative_count),
            ("semantic.connection_display_count", sem.connection_display_count),
            ("semantic.pairwise_window", sem.pairwise_window),
        ];
        if let Some(&(field, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(field, "must be greater than 0"));
        }

        if sem.embedding_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "semantic.embedding_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults when
    /// missing.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path).map_err(|source| ConfigError::Io {
            path: base_path.to_path_buf(),
            source,
        })?;

        let path = base_path.join(CONFIG_FILE);
        let config_str = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Creating default config at {}", path.display());
                String::new()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let mut config: Self = if config_str.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(&config_str)?
        };
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.path();
        let temp_path = self.base_path.join(format!(".{CONFIG_FILE}.tmp"));
        let config_str = serde_yml::to_string(&self)?;

        std::fs::write(&temp_path, config_str.as_bytes())
            .and_then(|_| std::fs::rename(&temp_path, &path))
            .map_err(|source| ConfigError::Io { path, source })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path(&self) -> PathBuf {
        self.base_path.join(CONFIG_FILE)
    }
}
