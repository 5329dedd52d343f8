//! PDF thumbnails: first-page previews for catalog materials.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Rasterize page 1** | poppler `pdftoppm`, PNG on stdout |
//! | **Decode** | `image::load_from_memory_with_format` |
//! | **Scale** | [`fit_within`] + Lanczos3 |
//! | **Sharpen** | `unsharpen` (optional) |
//! | **Encode** | PNG or lossless WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Output format and render settings
//! - **Rasterizer**: [`PageRasterizer`] trait + [`PdftoppmRasterizer`]
//! - **Generator**: [`ThumbnailGenerator`], which names, renders, and cleans up files

mod calculations;
pub mod generator;
mod params;
pub mod rasterizer;

pub use calculations::fit_within;
pub use generator::{RegenerateStats, ThumbnailGenerator, ThumbnailReport, thumbnail_name};
pub use params::{RenderSpec, Sharpening, ThumbnailFormat};
pub use rasterizer::{PageRasterizer, PdftoppmRasterizer, ThumbnailError};
