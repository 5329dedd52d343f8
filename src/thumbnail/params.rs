//! Parameter types for thumbnail rendering.
//!
//! These describe *what* to produce, not *how*: the
//! [`generator`](super::generator) decides which file to write and the
//! [`rasterizer`](super::rasterizer) does the page rendering.
//!
//! - [`ThumbnailFormat`]: output encoding, `png` or lossless `webp`.
//! - [`Sharpening`]: unsharp-mask parameters applied after downscaling.
//! - [`RenderSpec`]: bounding box, rasterization DPI, optional sharpening.

use crate::config::ThumbnailsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format of a thumbnail file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Png,
    Webp,
}

impl ThumbnailFormat {
    /// Every format a thumbnail may exist in.
    pub const ALL: [ThumbnailFormat; 2] = [ThumbnailFormat::Png, ThumbnailFormat::Webp];

    pub fn extension(self) -> &'static str {
        match self {
            ThumbnailFormat::Png => "png",
            ThumbnailFormat::Webp => "webp",
        }
    }

    /// Lenient parse for request parameters: unknown or missing values fall
    /// back to PNG instead of failing the request.
    pub fn from_request(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for ThumbnailFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ThumbnailFormat::Png),
            "webp" => Ok(ThumbnailFormat::Webp),
            other => Err(format!("unsupported thumbnail format: {other}")),
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening; keeps small text legible after downscaling.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// How a first page becomes a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSpec {
    pub max_width: u32,
    pub max_height: u32,
    pub dpi: u32,
    pub sharpening: Option<Sharpening>,
}

impl RenderSpec {
    pub fn from_config(config: &ThumbnailsConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
            dpi: config.dpi,
            sharpening: config.sharpen.then(Sharpening::light),
        }
    }
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self::from_config(&ThumbnailsConfig::default())
    }
}
