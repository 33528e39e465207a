//! Configuration for the storage engine
//!
//! Handles loading configuration from TOML files and environment variable
//! overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Storage engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Advisory memory budget for the in-memory tier, in megabytes
    #[serde(default = "default_memory_cache_size_mb")]
    pub memory_cache_size_mb: usize,

    /// Root directory for segment files
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    /// Whether segment payloads are written codec-compressed
    #[serde(default = "default_enable_compression")]
    pub enable_compression: bool,

    /// Advisory ingest batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Advisory maximum segment size, in megabytes
    #[serde(default = "default_max_segment_size_mb")]
    pub max_segment_size_mb: usize,

    /// Hard threshold: memory point count that triggers an automatic flush
    #[serde(default = "default_max_memory_points")]
    pub max_memory_points: usize,

    /// Disk tier sub-configuration
    #[serde(default)]
    pub disk: DiskConfig,
}

/// Disk tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiskConfig {
    /// Whether segment payloads are written codec-compressed
    #[serde(default = "default_enable_compression")]
    pub enable_compression: bool,

    /// Advisory ingest batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Advisory maximum segment size, in megabytes
    #[serde(default = "default_max_segment_size_mb")]
    pub max_segment_size_mb: usize,
}

fn default_memory_cache_size_mb() -> usize {
    256
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("tickstore_data")
}

fn default_enable_compression() -> bool {
    true
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_segment_size_mb() -> usize {
    64
}

fn default_max_memory_points() -> usize {
    1_000_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_cache_size_mb: default_memory_cache_size_mb(),
            data_directory: default_data_directory(),
            enable_compression: default_enable_compression(),
            batch_size: default_batch_size(),
            max_segment_size_mb: default_max_segment_size_mb(),
            max_memory_points: default_max_memory_points(),
            disk: DiskConfig::default(),
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            enable_compression: default_enable_compression(),
            batch_size: default_batch_size(),
            max_segment_size_mb: default_max_segment_size_mb(),
        }
    }
}

impl EngineConfig {
    /// Config rooted at a data directory, defaults elsewhere
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            ..Default::default()
        }
    }

    /// Disable payload compression on both tiers
    pub fn without_compression(mut self) -> Self {
        self.enable_compression = false;
        self.disk.enable_compression = false;
        self
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load from a TOML file with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TICKSTORE_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("TICKSTORE_DATA_DIR") {
            self.data_directory = PathBuf::from(data_dir);
        }
        if let Ok(max_points) = std::env::var("TICKSTORE_MAX_MEMORY_POINTS") {
            if let Ok(n) = max_points.parse() {
                self.max_memory_points = n;
            }
        }
        if let Ok(compression) = std::env::var("TICKSTORE_COMPRESSION") {
            if let Ok(enabled) = compression.parse() {
                self.enable_compression = enabled;
                self.disk.enable_compression = enabled;
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}
