//! Thumbnail files: naming, rendering, lookup, and cleanup.
//!
//! ## Naming
//!
//! Thumbnails are **path-addressed**: the file name is the SHA-256 of the
//! PDF's normalized storage path plus the format extension.
//!
//! ```text
//! /data/notes/semester-1/cse/data-structures/Unit_1.pdf
//!   → data/thumbnails/3f1c…9ab2.png
//!   → data/thumbnails/3f1c…9ab2.webp
//! ```
//!
//! Hashing the full path (rather than a sanitized stem) means two PDFs can
//! never share a thumbnail, and the same PDF always maps to the same file, so
//! [`ThumbnailGenerator::thumbnail_path`] and
//! [`ThumbnailGenerator::thumbnail_url`] can be computed without touching
//! the disk. Leading slashes and backslashes are normalized away first, so
//! `/data/notes/a.pdf` and `data/notes/a.pdf` share one thumbnail.
//!
//! ## Failure policy
//!
//! A thumbnail is a derived convenience artifact. [`generate_thumbnail`]
//! therefore never returns an error: every failure (missing renderer,
//! malformed PDF, I/O) becomes a [`ThumbnailReport`] with `success = false`.
//! The lazy path, [`ensure_thumbnail`], is the exception: it serves a
//! thumbnail request, so there the error is the answer.
//!
//! [`generate_thumbnail`]: ThumbnailGenerator::generate_thumbnail
//! [`ensure_thumbnail`]: ThumbnailGenerator::ensure_thumbnail

use super::calculations::fit_within;
use super::params::{RenderSpec, ThumbnailFormat};
use super::rasterizer::{PageRasterizer, PdftoppmRasterizer, ThumbnailError};
use crate::config::ShelfConfig;
use crate::naming::{escapes_root, normalize_storage_path};
use image::DynamicImage;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Thumbnail file name for a PDF storage path.
pub fn thumbnail_name(pdf_path: &str, format: ThumbnailFormat) -> String {
    let digest = Sha256::digest(normalize_storage_path(pdf_path).as_bytes());
    format!("{:x}.{}", digest, format.extension())
}

/// Whether `name` has the shape [`thumbnail_name`] produces: 64 lowercase hex
/// digits and a known extension.
fn is_thumbnail_name(name: &str) -> bool {
    ThumbnailFormat::ALL.iter().any(|format| {
        name.strip_suffix(format.extension())
            .and_then(|stem| stem.strip_suffix('.'))
            .is_some_and(|hash| {
                hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            })
    })
}

/// Outcome of a best-effort generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailReport {
    pub success: bool,
    pub message: String,
}

impl ThumbnailReport {
    fn generated(path: &Path) -> Self {
        Self {
            success: true,
            message: format!("Thumbnail generated: {}", path.display()),
        }
    }

    fn failed(error: &ThumbnailError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
        }
    }
}

/// Summary of a batch regeneration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegenerateStats {
    pub generated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl RegenerateStats {
    pub fn total(&self) -> u32 {
        self.generated + self.skipped + self.failed
    }
}

impl fmt::Display for RegenerateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped > 0 || self.failed > 0 {
            write!(
                f,
                "{} generated, {} skipped, {} failed ({} total)",
                self.generated,
                self.skipped,
                self.failed,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.generated)
        }
    }
}

enum BatchOutcome {
    Generated,
    Skipped,
    Failed,
}

/// Renders and manages thumbnails under one directory of the site root.
pub struct ThumbnailGenerator<R = PdftoppmRasterizer> {
    root: PathBuf,
    /// Thumbnails directory relative to `root`, forward slashes, no edge slashes.
    dir: String,
    spec: RenderSpec,
    rasterizer: R,
}

impl ThumbnailGenerator<PdftoppmRasterizer> {
    /// Generator rendering through the configured poppler executable.
    pub fn from_config(root: impl Into<PathBuf>, config: &ShelfConfig) -> Self {
        Self::new(
            root,
            &config.storage.thumbnails_dir,
            RenderSpec::from_config(&config.thumbnails),
            PdftoppmRasterizer::new(config.thumbnails.renderer.clone()),
        )
    }
}

impl<R: PageRasterizer> ThumbnailGenerator<R> {
    pub fn new(root: impl Into<PathBuf>, dir: &str, spec: RenderSpec, rasterizer: R) -> Self {
        Self {
            root: root.into(),
            dir: normalize_storage_path(dir).trim_end_matches('/').to_string(),
            spec,
            rasterizer,
        }
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Absolute (root-joined) thumbnails directory.
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join(&self.dir)
    }

    /// Create the thumbnails directory if absent. Idempotent.
    pub fn ensure_thumbnails_dir(&self) -> io::Result<()> {
        fs::create_dir_all(self.thumbnails_dir())
    }

    /// Where the thumbnail for `pdf_path` in `format` lives. Pure.
    pub fn thumbnail_path(&self, pdf_path: &str, format: ThumbnailFormat) -> PathBuf {
        self.thumbnails_dir().join(thumbnail_name(pdf_path, format))
    }

    /// Public URL of the file [`thumbnail_path`](Self::thumbnail_path) names.
    pub fn thumbnail_url(&self, pdf_path: &str, format: ThumbnailFormat) -> String {
        format!("/{}/{}", self.dir, thumbnail_name(pdf_path, format))
    }

    /// Render the first page of `pdf_path` to its thumbnail, best-effort.
    pub fn generate_thumbnail(&self, pdf_path: &str, format: ThumbnailFormat) -> ThumbnailReport {
        match self.render(pdf_path, format) {
            Ok(path) => ThumbnailReport::generated(&path),
            Err(e) => {
                debug!(pdf = pdf_path, error = %e, "thumbnail generation failed");
                ThumbnailReport::failed(&e)
            }
        }
    }

    /// Return the thumbnail for `pdf_path`, rendering it on first request.
    pub fn ensure_thumbnail(
        &self,
        pdf_path: &str,
        format: ThumbnailFormat,
    ) -> Result<PathBuf, ThumbnailError> {
        if escapes_root(pdf_path) {
            return Err(ThumbnailError::OutsideRoot(pdf_path.to_string()));
        }
        let path = self.thumbnail_path(pdf_path, format);
        if path.is_file() {
            return Ok(path);
        }
        self.render(pdf_path, format)
    }

    /// Remove the thumbnail of `pdf_path` in every format.
    ///
    /// Returns whether any file was deleted. A missing thumbnail is not an
    /// error; other I/O failures are logged and skipped.
    pub fn delete_thumbnail(&self, pdf_path: &str) -> bool {
        let mut deleted = false;
        for format in ThumbnailFormat::ALL {
            let path = self.thumbnail_path(pdf_path, format);
            match fs::remove_file(&path) {
                Ok(()) => deleted = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not delete thumbnail"),
            }
        }
        deleted
    }

    /// Generate thumbnails for many PDFs in parallel on the rayon pool.
    ///
    /// Existing thumbnails are kept unless `force` is set.
    pub fn regenerate(
        &self,
        pdf_paths: &[String],
        format: ThumbnailFormat,
        force: bool,
    ) -> RegenerateStats {
        let outcomes: Vec<BatchOutcome> = pdf_paths
            .par_iter()
            .map(|pdf_path| {
                if !force && self.thumbnail_path(pdf_path, format).is_file() {
                    return BatchOutcome::Skipped;
                }
                match self.render(pdf_path, format) {
                    Ok(_) => BatchOutcome::Generated,
                    Err(e) => {
                        warn!(pdf = %pdf_path, error = %e, "thumbnail regeneration failed");
                        BatchOutcome::Failed
                    }
                }
            })
            .collect();

        let mut stats = RegenerateStats::default();
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Generated => stats.generated += 1,
                BatchOutcome::Skipped => stats.skipped += 1,
                BatchOutcome::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Delete thumbnail files that belong to none of `known_pdf_paths` in any
    /// format. Files not named like a thumbnail are never touched. Returns the
    /// deleted paths.
    pub fn prune_orphans(&self, known_pdf_paths: &[String]) -> io::Result<Vec<PathBuf>> {
        let dir = self.thumbnails_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let expected: HashSet<String> = known_pdf_paths
            .iter()
            .flat_map(|p| ThumbnailFormat::ALL.map(|f| thumbnail_name(p, f)))
            .collect();

        let mut removed = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !is_thumbnail_name(&name) || expected.contains(&*name) {
                continue;
            }
            fs::remove_file(entry.path())?;
            removed.push(entry.path().to_path_buf());
        }
        removed.sort();
        Ok(removed)
    }

    /// Rasterize, scale, sharpen, and encode one thumbnail.
    fn render(&self, pdf_path: &str, format: ThumbnailFormat) -> Result<PathBuf, ThumbnailError> {
        if escapes_root(pdf_path) {
            return Err(ThumbnailError::OutsideRoot(pdf_path.to_string()));
        }
        let pdf = self.root.join(normalize_storage_path(pdf_path));
        if !pdf.is_file() {
            return Err(ThumbnailError::PdfNotFound(pdf));
        }

        self.ensure_thumbnails_dir()?;
        let page = self.rasterizer.render_first_page(&pdf, self.spec.dpi)?;
        let thumb = self.shrink(page);

        let output = self.thumbnail_path(pdf_path, format);
        write_atomically(&thumb, &output, format)?;
        debug!(pdf = %pdf.display(), thumbnail = %output.display(), "thumbnail written");
        Ok(output)
    }

    fn shrink(&self, page: DynamicImage) -> DynamicImage {
        let (w, h) = fit_within(
            (page.width(), page.height()),
            (self.spec.max_width, self.spec.max_height),
        );
        let scaled = if (w, h) == (page.width(), page.height()) {
            page
        } else {
            page.resize_exact(w, h, FilterType::Lanczos3)
        };

        match self.spec.sharpening {
            Some(sharpening) => scaled.unsharpen(sharpening.sigma, sharpening.threshold),
            None => scaled,
        }
    }
}

/// Encode into a sibling temp file, then rename over `output`, so readers
/// never see a half-written thumbnail.
fn write_atomically(
    img: &DynamicImage,
    output: &Path,
    format: ThumbnailFormat,
) -> Result<(), ThumbnailError> {
    let tmp = output.with_extension(format!("{}.tmp", format.extension()));
    let result = encode(img, &tmp, format).and_then(|()| Ok(fs::rename(&tmp, output)?));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn encode(img: &DynamicImage, path: &Path, format: ThumbnailFormat) -> Result<(), ThumbnailError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    match format {
        ThumbnailFormat::Png => img.write_with_encoder(PngEncoder::new(&mut writer))?,
        // The WebP encoder only takes 8-bit RGB(A).
        ThumbnailFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut writer))?,
    }
    writer.flush()?;
    Ok(())
}
