//! Studio configuration module.
//!
//! Handles loading, validating, and merging `studio.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top of it, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `studio.toml` lives in the data directory (the `--data` flag, default
//! `studio-data/`), next to the `galleries/` and `objects/` folders written by
//! the local stores.
//!
//! ## Configuration Options
//!
//! ```toml
//! [compression]
//! max_dimension = 2000        # Longer edge cap in pixels
//! quality = 70                # JPEG quality (1-100)
//!
//! [upload]
//! batch_size = 5              # Concurrent uploads per batch
//! max_file_size = 10485760    # 10 MiB per file
//! max_total_size = 52428800   # 50 MiB per session
//!
//! [viewer]
//! eager_count = 6             # Images loaded eagerly above the fold
//! url_ttl_secs = 3600         # Lifetime of resolved image URLs
//!
//! [site]
//! base_url = "http://localhost:8080"
//! studio_name = "Your Photography Studio"
//!
//! [processing]
//! max_processes = 4           # Compression workers (omit for auto = CPU cores)
//!
//! [auth]
//! owner_email = "owner@example.com"
//! password_sha256 = "..."     # Omit to leave admin commands open
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up inside the data directory.
pub const CONFIG_FILENAME: &str = "studio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Studio configuration loaded from `studio.toml`.
///
/// All fields have defaults matching the production upload screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudioConfig {
    /// Client-side compression before upload.
    pub compression: CompressionConfig,
    /// Batch size and admission limits.
    pub upload: UploadConfig,
    /// Client gallery page behaviour.
    pub viewer: ViewerConfig,
    /// Public site settings used for share links and emails.
    pub site: SiteConfig,
    /// Parallel compression settings.
    pub processing: ProcessingConfig,
    /// Owner credentials for admin commands.
    pub auth: AuthConfig,
}

impl StudioConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.quality == 0 || self.compression.quality > 100 {
            return Err(ConfigError::Validation(
                "compression.quality must be 1-100".into(),
            ));
        }
        if self.compression.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "compression.max_dimension must be non-zero".into(),
            ));
        }
        if self.upload.batch_size == 0 {
            return Err(ConfigError::Validation(
                "upload.batch_size must be at least 1".into(),
            ));
        }
        if self.upload.max_file_size > self.upload.max_total_size {
            return Err(ConfigError::Validation(
                "upload.max_file_size must not exceed upload.max_total_size".into(),
            ));
        }
        if self.viewer.url_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "viewer.url_ttl_secs must be non-zero".into(),
            ));
        }
        if let Some(hash) = &self.auth.password_sha256 {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Validation(
                    "auth.password_sha256 must be 64 hex characters".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Compression applied to each selected image before upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Longest allowed edge, in pixels.
    pub max_dimension: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            quality: 70,
        }
    }
}

/// Upload batching and admission limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Uploads started together; the next batch waits for all of them.
    pub batch_size: usize,
    /// Per-file limit in bytes.
    pub max_file_size: u64,
    /// Per-session limit in bytes.
    pub max_total_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_file_size: 10 * 1024 * 1024,
            max_total_size: 50 * 1024 * 1024,
        }
    }
}

/// Client gallery page settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Number of leading images rendered with eager loading.
    pub eager_count: usize,
    /// Validity of resolved image URLs, in seconds.
    pub url_ttl_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            eager_count: 6,
            url_ttl_secs: 3600,
        }
    }
}

/// Public site settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Origin used for shareable gallery links (no trailing slash needed).
    pub base_url: String,
    /// Signature used in client emails.
    pub studio_name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            studio_name: "Your Photography Studio".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent, defaults to the number of CPU cores.
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
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Studio owner credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub owner_email: String,
    /// Hex SHA-256 of the owner password. Admin commands are open when unset.
    pub password_sha256: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            owner_email: "owner@localhost".to_string(),
            password_sha256: None,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(StudioConfig::default()).expect("default config must serialize")
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

/// Load `studio.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<StudioConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StudioConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `studio.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<StudioConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `studio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Studio Gallery Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Compression applied before upload
# ---------------------------------------------------------------------------
[compression]
# Images whose longer edge exceeds this are scaled down to it.
max_dimension = 2000

# JPEG quality for re-encoded images (1 = worst, 100 = best).
# PNG and WebP are re-encoded losslessly.
quality = 70

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[upload]
# Files uploaded concurrently. The next batch starts when all have settled.
batch_size = 5

# Largest accepted file, in bytes (10 MiB).
max_file_size = 10485760

# Largest accepted session total, in bytes (50 MiB).
max_total_size = 52428800

# ---------------------------------------------------------------------------
# Client gallery page
# ---------------------------------------------------------------------------
[viewer]
# Images loaded eagerly; the rest load lazily.
eager_count = 6

# Lifetime of resolved image URLs, in seconds.
url_ttl_secs = 3600

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Origin for shareable links: <base_url>/gallery/<id>
base_url = "http://localhost:8080"

# Signature used in client emails.
studio_name = "Your Photography Studio"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Admin access
# ---------------------------------------------------------------------------
[auth]
owner_email = "owner@localhost"

# Hex SHA-256 of the owner password. When set, admin commands need --password.
# password_sha256 = "..."
"##
}
