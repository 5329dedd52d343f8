//! Shelf configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives at
//! the site root (the directory the catalog and upload paths are relative to)
//! and is optional: stock defaults reproduce the classic layout.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! upload_dir = "data/notes"                # PDFs: <upload_dir>/semester-<id>/<branch>/<subject>/
//! catalog = "data/notes-data.json"         # The JSON catalog
//! thumbnails_dir = "data/thumbnails"       # Generated previews
//! download_endpoint = "/api/download"      # Base of every material's downloadUrl
//!
//! [thumbnails]
//! format = "png"            # "png" or "webp"
//! max_width = 300           # Bounding box for the rendered first page
//! max_height = 400
//! dpi = 72                  # Rasterization resolution
//! sharpen = true            # Light unsharp mask after downscaling
//! renderer = "pdftoppm"     # Poppler rasterizer executable
//!
//! [processing]
//! max_processes = 4         # Max parallel workers for `regenerate` (omit for auto)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::thumbnail::ThumbnailFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file inside the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Shelf configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShelfConfig {
    /// Where PDFs, the catalog, and thumbnails live.
    pub storage: StorageConfig,
    /// Thumbnail rendering settings.
    pub thumbnails: ThumbnailsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ShelfConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("storage.upload_dir", &self.storage.upload_dir),
            ("storage.catalog", &self.storage.catalog),
            ("storage.thumbnails_dir", &self.storage.thumbnails_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
            if Path::new(value).is_absolute() || crate::naming::escapes_root(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a path inside the site root"
                )));
            }
        }
        // thumbnails_dir must not be or enclose the other storage directories
        let thumbnails = normal_components(&self.storage.thumbnails_dir);
        let catalog_dir = normal_components(&self.storage.catalog)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        for (key, dir) in [
            ("storage.catalog", catalog_dir),
            ("storage.upload_dir", normal_components(&self.storage.upload_dir)),
        ] {
            if dir.starts_with(&thumbnails) {
                return Err(ConfigError::Validation(format!(
                    "storage.thumbnails_dir must not contain {key}"
                )));
            }
        }
        if !self.storage.download_endpoint.starts_with('/') {
            return Err(ConfigError::Validation(
                "storage.download_endpoint must start with '/'".into(),
            ));
        }
        if self.thumbnails.max_width == 0 || self.thumbnails.max_height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_width and thumbnails.max_height must be non-zero".into(),
            ));
        }
        if !(18..=600).contains(&self.thumbnails.dpi) {
            return Err(ConfigError::Validation(
                "thumbnails.dpi must be 18-600".into(),
            ));
        }
        if self.thumbnails.renderer.trim().is_empty() {
            return Err(ConfigError::Validation(
                "thumbnails.renderer must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Storage layout, every path relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root folder for uploaded PDFs.
    pub upload_dir: String,
    /// The JSON catalog file.
    pub catalog: String,
    /// Folder holding generated thumbnails; also their public URL prefix.
    pub thumbnails_dir: String,
    /// Endpoint that serves a material given `?path=`.
    pub download_endpoint: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "data/notes".to_string(),
            catalog: "data/notes-data.json".to_string(),
            thumbnails_dir: "data/thumbnails".to_string(),
            download_endpoint: "/api/download".to_string(),
        }
    }
}

/// Thumbnail rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Format generated on upload and used when none is requested.
    pub format: ThumbnailFormat,
    /// Bounding box the first page is scaled into.
    pub max_width: u32,
    pub max_height: u32,
    /// Resolution the page is rasterized at before scaling.
    pub dpi: u32,
    /// Apply a light unsharp mask after downscaling.
    pub sharpen: bool,
    /// Rasterizer executable (poppler's `pdftoppm` or a compatible tool).
    pub renderer: String,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            format: ThumbnailFormat::Png,
            max_width: 300,
            max_height: 400,
            dpi: 72,
            sharpen: true,
            renderer: "pdftoppm".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Lexical form of a root-relative path: `.` dropped, `..` applied.
fn normal_components(path: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in Path::new(&crate::naming::normalize_storage_path(path)).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            _ => {}
        }
    }
    clean
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

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ShelfConfig::default())?)
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

/// Load `config.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from the site root: user values over stock defaults,
/// unknown keys rejected, result validated.
pub fn load_config(root: &Path) -> Result<ShelfConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: ShelfConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# notes-shelf configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# Every path is relative to the site root (the directory holding this file).

# ---------------------------------------------------------------------------
# Storage layout
# ---------------------------------------------------------------------------
[storage]
# Uploaded PDFs go to <upload_dir>/semester-<id>/<branch>/<subject-folder>/.
upload_dir = "data/notes"

# The JSON catalog (semesters -> branches -> subjects -> materials).
catalog = "data/notes-data.json"

# Generated thumbnails. Also used as their public URL prefix.
thumbnails_dir = "data/thumbnails"

# Endpoint serving a material file; downloadUrl = <endpoint>?path=<path>.
download_endpoint = "/api/download"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Format generated on upload: "png" or "webp" (lossless).
format = "png"

# The first page is scaled down to fit this box (never scaled up).
max_width = 300
max_height = 400

# Rasterization resolution before scaling (18-600).
dpi = 72

# Light unsharp mask after downscaling.
sharpen = true

# Rasterizer executable. Must accept pdftoppm's arguments.
renderer = "pdftoppm"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `regenerate`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
