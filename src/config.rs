//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `pixelscale.toml`. Stock defaults
//! are the base layer; a user file overrides just the keys it names, and
//! `PIXELSCALE_*` environment variables override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "./uploads"              # Local object store directory
//! public_url_prefix = "/uploads"  # Prefix of public object URLs
//! raw_bucket = "pixelscale-raw"   # Bucket holding uploaded sources
//! processed_bucket = "pixelscale-processed"
//!
//! [limits]
//! max_source_dimension = 16384    # Largest accepted source edge, in pixels
//!
//! [processing]
//! max_processes = 4               # Max parallel workers (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"                  # Default filter when RUST_LOG is unset
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Key |
//! |---|---|
//! | `PIXELSCALE_STORAGE_ROOT` | `storage.root` |
//! | `PIXELSCALE_PUBLIC_URL_PREFIX` | `storage.public_url_prefix` |
//! | `PIXELSCALE_RAW_BUCKET` | `storage.raw_bucket` |
//! | `PIXELSCALE_PROCESSED_BUCKET` | `storage.processed_bucket` |
//! | `PIXELSCALE_MAX_SOURCE_DIMENSION` | `limits.max_source_dimension` |
//! | `PIXELSCALE_LOG` | `logging.level` |
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::DecodeLimits;
use crate::imaging::codec::DEFAULT_MAX_SOURCE_DIMENSION;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pixelscale.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.storage;
        if storage.raw_bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.raw_bucket must not be empty".into(),
            ));
        }
        if storage.processed_bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.processed_bucket must not be empty".into(),
            ));
        }
        if storage.raw_bucket == storage.processed_bucket {
            return Err(ConfigError::Validation(
                "storage.raw_bucket and storage.processed_bucket must differ".into(),
            ));
        }
        if self.limits.max_source_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_source_dimension must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation(format!(
                "logging.level {:?} is not a valid filter: {e}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Apply `PIXELSCALE_*` overrides. `lookup` is `std::env::var` in the CLI.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(root) = lookup("PIXELSCALE_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(prefix) = lookup("PIXELSCALE_PUBLIC_URL_PREFIX") {
            self.storage.public_url_prefix = prefix;
        }
        if let Some(bucket) = lookup("PIXELSCALE_RAW_BUCKET") {
            self.storage.raw_bucket = bucket;
        }
        if let Some(bucket) = lookup("PIXELSCALE_PROCESSED_BUCKET") {
            self.storage.processed_bucket = bucket;
        }
        if let Some(max) = lookup("PIXELSCALE_MAX_SOURCE_DIMENSION") {
            self.limits.max_source_dimension = max.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "PIXELSCALE_MAX_SOURCE_DIMENSION must be a positive integer, got {max:?}"
                ))
            })?;
        }
        if let Some(level) = lookup("PIXELSCALE_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }
}

/// Where objects live and how they are addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory of the local object store.
    pub root: PathBuf,
    /// Public URLs are `{public_url_prefix}/{key}`.
    pub public_url_prefix: String,
    /// Bucket holding original uploads.
    pub raw_bucket: String,
    /// Bucket derivatives are published to.
    pub processed_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            public_url_prefix: "/uploads".to_string(),
            raw_bucket: "pixelscale-raw".to_string(),
            processed_bucket: "pixelscale-processed".to_string(),
        }
    }
}

/// Source-size guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Sources wider or taller than this are rejected before decoding.
    pub max_source_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_source_dimension: DEFAULT_MAX_SOURCE_DIMENSION,
        }
    }
}

impl LimitsConfig {
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_dimension: self.max_source_dimension,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `pixelscale=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, which must exist.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(path)?.ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        ))
    })?;
    resolve_config(Some(overlay))
}

/// Load `pixelscale.toml` from `dir` if present, stock defaults otherwise.
pub fn load_config_in(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(&dir.join(DEFAULT_CONFIG_FILE))?)
}

/// Returns a fully-commented stock `pixelscale.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pixelscale Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be set through the environment:
#   PIXELSCALE_STORAGE_ROOT, PIXELSCALE_PUBLIC_URL_PREFIX,
#   PIXELSCALE_RAW_BUCKET, PIXELSCALE_PROCESSED_BUCKET,
#   PIXELSCALE_MAX_SOURCE_DIMENSION, PIXELSCALE_LOG
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding every object. Keys map to paths below it:
#   raw/abc.jpg                 -> ./uploads/raw/abc.jpg
#   processed/medium/abc.jpg    -> ./uploads/processed/medium/abc.jpg
root = "./uploads"

# Public URLs are "{public_url_prefix}/{key}".
public_url_prefix = "/uploads"

# Bucket names. Sources are read from the raw bucket, derivatives are
# published to the processed bucket. They must differ.
raw_bucket = "pixelscale-raw"
processed_bucket = "pixelscale-processed"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Sources wider or taller than this many pixels are rejected before decoding.
max_source_dimension = 16384

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for batch processing.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Default log filter. RUST_LOG takes precedence when set.
# Accepts any tracing filter directive, e.g. "debug" or "pixelscale=trace".
level = "info"
"##
}
