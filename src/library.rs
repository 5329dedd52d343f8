//! Material lifecycle: keeps PDFs, thumbnails, and catalog records in step.
//!
//! A material exists as three artifacts: the uploaded PDF under the upload
//! directory, its thumbnail(s) under the thumbnails directory, and a record in
//! the catalog. [`MaterialLibrary`] is the only code that changes more than one
//! of them, and it does so in a fixed order so a failure leaves the catalog
//! either untouched or fully written:
//!
//! ```text
//! add:     validate → resolve subject → write PDF → thumbnail (best-effort)
//!          → build record → upsert → persist        (PDF + thumbnail rolled back on failure,
//!                                                    a replaced PDF restored)
//!
//! remove:  validate → resolve subject → drop record → delete PDF
//!          → delete thumbnails (best-effort) → persist
//! ```
//!
//! Every mutation is a full load, mutate, persist cycle against the catalog
//! file. Nothing is cached between calls.
//!
//! Callers that speak HTTP (or the CLI) convert results into an
//! [`ActionResponse`], which carries the status code a handler would answer
//! with.

use crate::catalog::{Catalog, CatalogError, CatalogStore, Material, MaterialKind, SizeKb};
use crate::config::{ShelfConfig, StorageConfig};
use crate::naming::{
    catalog_path, escapes_root, normalize_storage_path, secure_filename, subject_folder,
};
use crate::thumbnail::{
    PageRasterizer, PdftoppmRasterizer, RegenerateStats, RenderSpec, ThumbnailError,
    ThumbnailFormat, ThumbnailGenerator,
};
use chrono::Local;
use serde::Serialize;
use serde_json::Map;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("Path escapes the site root: {0}")]
    OutsideRoot(String),
    #[error("{path} already belongs to {owner}")]
    PathConflict { path: String, owner: String },
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error("Storage error: {0}")]
    Io(#[from] io::Error),
}

impl LibraryError {
    /// HTTP status a request handler answers this error with.
    pub fn status(&self) -> u16 {
        match self {
            LibraryError::MissingFields(_)
            | LibraryError::InvalidFilename(_)
            | LibraryError::OutsideRoot(_)
            | LibraryError::Thumbnail(ThumbnailError::OutsideRoot(_)) => 400,
            LibraryError::FileNotFound(_)
            | LibraryError::Catalog(CatalogError::NotFound(_) | CatalogError::MaterialNotFound)
            | LibraryError::Thumbnail(ThumbnailError::PdfNotFound(_)) => 404,
            LibraryError::PathConflict { .. } => 409,
            _ => 500,
        }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

/// An uploaded file as received from the client.
#[derive(Debug, Clone, Default)]
pub struct PdfUpload {
    /// Client-supplied file name; sanitized before use.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Fields of an upload form. Empty strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub semester: String,
    pub branch: String,
    pub subject: String,
    pub title: String,
    pub description: String,
    pub pdf: Option<PdfUpload>,
}

impl UploadRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = [
            ("semester", &self.semester),
            ("branch", &self.branch),
            ("subject", &self.subject),
            ("title", &self.title),
            ("description", &self.description),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if self.pdf.as_ref().is_none_or(|pdf| pdf.file_name.is_empty()) {
            missing.push("pdf");
        }
        missing
    }
}

/// Fields identifying a material to delete.
#[derive(Debug, Clone, Default)]
pub struct RemovalRequest {
    pub semester: String,
    pub branch: String,
    pub subject: String,
    pub path: String,
}

impl RemovalRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("semester", &self.semester),
            ("branch", &self.branch),
            ("subject", &self.subject),
            ("path", &self.path),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct AddedMaterial {
    pub material: Material,
    /// Whether an existing record at the same path was replaced.
    pub replaced: bool,
    /// Whether the thumbnail was rendered during the upload.
    pub thumbnail_generated: bool,
}

/// Structured outcome of an operation, shaped like the JSON a handler returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            thumbnail_url: None,
            status: 200,
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}

impl From<&LibraryError> for ActionResponse {
    fn from(error: &LibraryError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            thumbnail_url: None,
            status: error.status(),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns the catalog file, the upload directory, and the thumbnails for one
/// site root.
pub struct MaterialLibrary<R = PdftoppmRasterizer> {
    root: PathBuf,
    storage: StorageConfig,
    store: CatalogStore,
    thumbnails: ThumbnailGenerator<R>,
    format: ThumbnailFormat,
}

impl MaterialLibrary<PdftoppmRasterizer> {
    pub fn from_config(root: impl Into<PathBuf>, config: &ShelfConfig) -> Self {
        let rasterizer = PdftoppmRasterizer::new(config.thumbnails.renderer.clone());
        Self::new(root, config, rasterizer)
    }
}

impl<R: PageRasterizer> MaterialLibrary<R> {
    pub fn new(root: impl Into<PathBuf>, config: &ShelfConfig, rasterizer: R) -> Self {
        let root = root.into();
        let store = CatalogStore::new(root.join(normalize_storage_path(&config.storage.catalog)));
        let thumbnails = ThumbnailGenerator::new(
            root.clone(),
            &config.storage.thumbnails_dir,
            RenderSpec::from_config(&config.thumbnails),
            rasterizer,
        );
        Self {
            root,
            storage: config.storage.clone(),
            store,
            thumbnails,
            format: config.thumbnails.format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn thumbnails(&self) -> &ThumbnailGenerator<R> {
        &self.thumbnails
    }

    /// Load the current catalog.
    pub fn catalog(&self) -> Result<Catalog, LibraryError> {
        Ok(self.store.load()?)
    }

    /// Store an uploaded PDF and record it under its subject.
    pub fn add_material(&self, request: UploadRequest) -> Result<AddedMaterial, LibraryError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(LibraryError::MissingFields(missing));
        }
        let UploadRequest {
            semester,
            branch,
            subject,
            title,
            description,
            pdf,
        } = request;
        let pdf = pdf.unwrap_or_default();

        let mut catalog = self.store.load()?;
        let subject_name = catalog.find_subject(&semester, &branch, &subject)?.name.clone();

        let file_name = secure_filename(&pdf.file_name);
        if file_name.is_empty() {
            return Err(LibraryError::InvalidFilename(pdf.file_name));
        }
        let relative = format!(
            "{}/semester-{}/{}/{}/{}",
            self.upload_dir(),
            semester,
            branch,
            subject_folder(&subject_name),
            file_name
        );
        if escapes_root(&relative) {
            return Err(LibraryError::OutsideRoot(relative));
        }
        let storage_path = catalog_path(&relative);

        let replacing = match catalog.locate_material(&storage_path) {
            Some(owner) if !owner.is(&semester, &branch, &subject) => {
                return Err(LibraryError::PathConflict {
                    path: storage_path,
                    owner: owner.to_string(),
                });
            }
            Some(_) => true,
            None => false,
        };

        let file = self.root.join(&relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        // The previous PDF stays recoverable until the new record is persisted
        let backup = if replacing && file.is_file() {
            let backup = backup_path(&file);
            fs::rename(&file, &backup)?;
            Some(backup)
        } else {
            None
        };
        if let Err(e) = fs::write(&file, &pdf.bytes) {
            if let Some(backup) = &backup {
                restore_backup(backup, &file);
            }
            return Err(e.into());
        }
        debug!(file = %file.display(), bytes = pdf.bytes.len(), "PDF stored");

        if replacing {
            self.thumbnails.delete_thumbnail(&storage_path);
        }
        let report = self.thumbnails.generate_thumbnail(&storage_path, self.format);
        if report.success {
            info!(pdf = %storage_path, "{}", report.message);
        } else {
            warn!(pdf = %storage_path, "thumbnail not generated: {}", report.message);
        }

        let recorded = self
            .build_material(&storage_path, &file, title, description)
            .and_then(|material| {
                catalog
                    .find_subject_mut(&semester, &branch, &subject)?
                    .upsert_material(material.clone());
                self.store.persist(&catalog)?;
                Ok(material)
            });

        match recorded {
            Ok(material) => {
                if let Some(backup) = &backup
                    && let Err(e) = fs::remove_file(backup)
                {
                    warn!(file = %backup.display(), error = %e, "could not remove replaced PDF");
                }
                info!(
                    path = %material.path,
                    semester = %semester,
                    branch = %branch,
                    subject = %subject,
                    replaced = replacing,
                    "material added"
                );
                Ok(AddedMaterial {
                    material,
                    replaced: replacing,
                    thumbnail_generated: report.success,
                })
            }
            Err(e) => {
                self.discard_upload(&file, &storage_path);
                if let Some(backup) = &backup {
                    restore_backup(backup, &file);
                    // The old thumbnail was deleted above; render it again
                    self.thumbnails.generate_thumbnail(&storage_path, self.format);
                }
                Err(e)
            }
        }
    }

    /// Delete a material's record, PDF, and thumbnails.
    pub fn remove_material(&self, request: &RemovalRequest) -> Result<Material, LibraryError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(LibraryError::MissingFields(missing));
        }

        let mut catalog = self.store.load()?;
        let material = catalog
            .find_subject_mut(&request.semester, &request.branch, &request.subject)?
            .remove_material(&request.path)?;

        if escapes_root(&material.path) {
            warn!(path = %material.path, "record points outside the site root, file left in place");
        } else {
            let file = self.root.join(normalize_storage_path(&material.path));
            match fs::remove_file(&file) {
                Ok(()) => debug!(file = %file.display(), "PDF deleted"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(file = %file.display(), "PDF already missing")
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !self.thumbnails.delete_thumbnail(&material.path) {
            debug!(path = %material.path, "no thumbnail to delete");
        }

        self.store.persist(&catalog)?;
        info!(
            path = %material.path,
            semester = %request.semester,
            branch = %request.branch,
            subject = %request.subject,
            "material removed"
        );
        Ok(material)
    }

    /// [`add_material`](Self::add_material) as a handler response.
    pub fn upload(&self, request: UploadRequest) -> ActionResponse {
        match self.add_material(request) {
            Ok(added) => ActionResponse::ok("PDF uploaded and notes updated.")
                .with_thumbnail(added.material.thumbnail_url),
            Err(e) => respond_with_error(&e),
        }
    }

    /// [`remove_material`](Self::remove_material) as a handler response.
    pub fn delete(&self, request: &RemovalRequest) -> ActionResponse {
        match self.remove_material(request) {
            Ok(_) => ActionResponse::ok("Material and thumbnail deleted successfully"),
            Err(e) => respond_with_error(&e),
        }
    }

    /// Thumbnail file for `path`, rendered on first request.
    ///
    /// Unknown `format` values fall back to PNG.
    pub fn ensure_thumbnail(
        &self,
        path: &str,
        format: Option<&str>,
    ) -> Result<PathBuf, LibraryError> {
        if path.is_empty() {
            return Err(LibraryError::MissingFields(vec!["path"]));
        }
        let format = ThumbnailFormat::from_request(format);
        Ok(self.thumbnails.ensure_thumbnail(path, format)?)
    }

    /// Render thumbnails for every material in the catalog.
    pub fn regenerate_thumbnails(
        &self,
        format: Option<ThumbnailFormat>,
        force: bool,
    ) -> Result<RegenerateStats, LibraryError> {
        let paths = self.store.load()?.material_paths();
        let format = format.unwrap_or(self.format);
        let stats = self.thumbnails.regenerate(&paths, format, force);
        info!(format = %format, "thumbnails regenerated: {stats}");
        Ok(stats)
    }

    /// Delete thumbnails that no catalog material accounts for.
    pub fn prune_thumbnails(&self) -> Result<Vec<PathBuf>, LibraryError> {
        let paths = self.store.load()?.material_paths();
        let removed = self.thumbnails.prune_orphans(&paths)?;
        info!(count = removed.len(), "orphaned thumbnails pruned");
        Ok(removed)
    }

    /// On-disk file behind a download request for `path`.
    pub fn resolve_download(&self, path: &str) -> Result<PathBuf, LibraryError> {
        if path.is_empty() {
            return Err(LibraryError::MissingFields(vec!["path"]));
        }
        if escapes_root(path) {
            return Err(LibraryError::OutsideRoot(path.to_string()));
        }
        let file = self.root.join(normalize_storage_path(path));
        if !file.is_file() {
            return Err(LibraryError::FileNotFound(path.to_string()));
        }
        Ok(file)
    }

    /// Download URL for a storage path: slashes stay readable.
    pub fn download_url(&self, storage_path: &str) -> String {
        let encoded = urlencoding::encode(storage_path).replace("%2F", "/");
        format!("{}?path={}", self.storage.download_endpoint, encoded)
    }

    fn upload_dir(&self) -> String {
        normalize_storage_path(&self.storage.upload_dir)
            .trim_end_matches('/')
            .to_string()
    }

    fn build_material(
        &self,
        storage_path: &str,
        file: &Path,
        title: String,
        description: String,
    ) -> Result<Material, LibraryError> {
        let bytes = fs::metadata(file)?.len();
        Ok(Material {
            title,
            description,
            path: storage_path.to_string(),
            kind: MaterialKind::Pdf,
            size: SizeKb::from_bytes(bytes),
            upload_date: Local::now().date_naive(),
            download_url: self.download_url(storage_path),
            thumbnail_url: self.thumbnails.thumbnail_url(storage_path, self.format),
            extra: Map::new(),
        })
    }

    fn discard_upload(&self, file: &Path, storage_path: &str) {
        if let Err(e) = fs::remove_file(file) {
            warn!(file = %file.display(), error = %e, "could not roll back uploaded PDF");
        }
        self.thumbnails.delete_thumbnail(storage_path);
    }
}

/// `Unit_1.pdf` → `Unit_1.pdf.bak`, next to the original.
fn backup_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    file.with_file_name(name)
}

fn restore_backup(backup: &Path, file: &Path) {
    if let Err(e) = fs::rename(backup, file) {
        warn!(file = %backup.display(), error = %e, "could not restore replaced PDF");
    }
}

fn respond_with_error(error: &LibraryError) -> ActionResponse {
    match error.status() {
        500 => warn!(error = %error, "operation failed"),
        _ => debug!(error = %error, "request rejected"),
    }
    ActionResponse::from(error)
}
