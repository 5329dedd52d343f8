//! Page rasterizer trait and the poppler-backed implementation.
//!
//! The [`PageRasterizer`] trait has a single job: turn the first page of a
//! PDF into pixels. Scaling, sharpening, and encoding happen afterwards in
//! the [`generator`](super::generator), so a rasterizer never needs to know
//! about thumbnail formats or sizes.
//!
//! The production implementation is [`PdftoppmRasterizer`], which shells out
//! to poppler's `pdftoppm` and reads a PNG back from its stdout. There is no
//! mature pure-Rust PDF renderer; keeping the renderer an external executable
//! means a missing install shows up as an ordinary thumbnail failure instead
//! of a build or link error.

use image::{DynamicImage, ImageFormat};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("PDF file not found: {0}")]
    PdfNotFound(PathBuf),
    #[error("Path escapes the site root: {0}")]
    OutsideRoot(String),
    #[error("Renderer `{0}` is not installed or not on PATH")]
    RendererUnavailable(String),
    #[error("Rendering failed: {0}")]
    RenderFailed(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Renders the first page of a PDF.
///
/// `Send + Sync` so one rasterizer can serve rayon workers during batch
/// regeneration.
pub trait PageRasterizer: Send + Sync {
    fn render_first_page(&self, pdf: &Path, dpi: u32) -> Result<DynamicImage, ThumbnailError>;
}

/// Rasterizer driving poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a single-page PNG render written to stdout.
    fn arguments(pdf: &Path, dpi: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-f", "1", "-l", "1", "-singlefile", "-png", "-r"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(dpi.to_string().into());
        args.push(pdf.as_os_str().to_owned());
        args
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn render_first_page(&self, pdf: &Path, dpi: u32) -> Result<DynamicImage, ThumbnailError> {
        let output = Command::new(&self.program)
            .args(Self::arguments(pdf, dpi))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ThumbnailError::RendererUnavailable(self.program.clone()),
                _ => ThumbnailError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ThumbnailError::RenderFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(ThumbnailError::RenderFailed(format!(
                "{} produced no image for {}",
                self.program,
                pdf.display()
            )));
        }

        Ok(image::load_from_memory_with_format(
            &output.stdout,
            ImageFormat::Png,
        )?)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::Mutex;

    /// Mock rasterizer that records calls and returns a flat page.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockRasterizer {
        pub page: (u32, u32),
        pub failure: Option<String>,
        pub calls: Mutex<Vec<(PathBuf, u32)>>,
    }

    impl MockRasterizer {
        pub fn new() -> Self {
            Self::with_page(595, 842)
        }

        pub fn with_page(width: u32, height: u32) -> Self {
            Self {
                page: (width, height),
                failure: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::new()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl PageRasterizer for MockRasterizer {
        fn render_first_page(&self, pdf: &Path, dpi: u32) -> Result<DynamicImage, ThumbnailError> {
            self.calls.lock().unwrap().push((pdf.to_path_buf(), dpi));
            if let Some(message) = &self.failure {
                return Err(ThumbnailError::RenderFailed(message.clone()));
            }
            let (w, h) = self.page;
            Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
            })))
        }
    }

    #[test]
    fn pdftoppm_arguments_render_first_page_only() {
        let args = PdftoppmRasterizer::arguments(Path::new("/notes/a.pdf"), 96);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-f", "1", "-l", "1", "-singlefile", "-png", "-r", "96", "/notes/a.pdf"
            ]
        );
    }

    #[test]
    fn missing_renderer_is_reported_as_unavailable() {
        let rasterizer = PdftoppmRasterizer::new("notes-shelf-no-such-renderer");
        let result = rasterizer.render_first_page(Path::new("/tmp/x.pdf"), 72);
        assert!(matches!(
            result,
            Err(ThumbnailError::RendererUnavailable(p)) if p == "notes-shelf-no-such-renderer"
        ));
    }

    #[test]
    fn mock_records_calls() {
        let mock = MockRasterizer::with_page(100, 50);
        let img = mock.render_first_page(Path::new("/a.pdf"), 72).unwrap();
        assert_eq!((img.width(), img.height()), (100, 50));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn failing_mock_returns_render_error() {
        let mock = MockRasterizer::failing("broken xref table");
        let err = mock.render_first_page(Path::new("/a.pdf"), 72).unwrap_err();
        assert!(err.to_string().contains("broken xref table"));
    }
}
