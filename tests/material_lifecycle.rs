//! End-to-end material lifecycle through the public API.
//!
//! Builds a site root in a temp dir, uploads, lists, regenerates, prunes, and
//! deletes through `MaterialLibrary`, with a stand-in rasterizer so the test
//! does not need poppler installed.
//!
//! Run with: cargo test --test material_lifecycle

use image::{DynamicImage, RgbImage};
use notes_shelf::catalog::{CatalogError, CatalogStore, SizeKb};
use notes_shelf::config::{ShelfConfig, load_config};
use notes_shelf::library::{
    ActionResponse, LibraryError, MaterialLibrary, PdfUpload, RemovalRequest, UploadRequest,
};
use notes_shelf::output::format_catalog;
use notes_shelf::thumbnail::{PageRasterizer, ThumbnailError, ThumbnailFormat};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "semesters": [
    {
      "id": 3,
      "name": "Semester 3",
      "branches": [
        {
          "id": "it",
          "name": "Information Technology",
          "subjects": [
            { "id": "dbms", "name": "Database Management", "code": "IT301" }
          ]
        }
      ]
    }
  ]
}"#;

/// Renders a fixed-size page, or fails for PDFs whose name contains "broken".
struct StubRasterizer;

impl PageRasterizer for StubRasterizer {
    fn render_first_page(&self, pdf: &Path, _dpi: u32) -> Result<DynamicImage, ThumbnailError> {
        if pdf.to_string_lossy().contains("broken") {
            return Err(ThumbnailError::RenderFailed("not a PDF".to_string()));
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            612,
            792,
            image::Rgb([250, 250, 245]),
        )))
    }
}

fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("store")).unwrap();
    fs::write(tmp.path().join("store/catalog.json"), CATALOG).unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        r#"
[storage]
upload_dir = "store/pdfs"
catalog = "store/catalog.json"
thumbnails_dir = "store/thumbs"
download_endpoint = "/files"

[thumbnails]
format = "webp"
max_width = 150
max_height = 200
"#,
    )
    .unwrap();
    tmp
}

fn library(root: &Path) -> MaterialLibrary<StubRasterizer> {
    let config = load_config(root).unwrap();
    MaterialLibrary::new(root, &config, StubRasterizer)
}

fn upload(file_name: &str, bytes: usize) -> UploadRequest {
    UploadRequest {
        semester: "3".to_string(),
        branch: "it".to_string(),
        subject: "dbms".to_string(),
        title: "Normal Forms".to_string(),
        description: "1NF to BCNF".to_string(),
        pdf: Some(PdfUpload {
            file_name: file_name.to_string(),
            bytes: vec![b'x'; bytes],
        }),
    }
}

#[test]
fn upload_list_and_delete() {
    let tmp = site();
    let library = library(tmp.path());

    let response = library.upload(upload("Normal Forms.pdf", 10 * 1024 + 5));
    assert!(response.success, "{}", response.message);
    let thumbnail_url = response.thumbnail_url.clone().unwrap();
    assert!(thumbnail_url.starts_with("/store/thumbs/"));
    assert!(thumbnail_url.ends_with(".webp"));

    // Thumbnail URL resolves to a real file within the configured box
    let thumbnail = tmp.path().join(thumbnail_url.trim_start_matches('/'));
    assert_eq!(image::image_dimensions(&thumbnail).unwrap(), (150, 194));

    let catalog = library.catalog().unwrap();
    let material = catalog.materials().next().unwrap();
    assert_eq!(material.path, "/store/pdfs/semester-3/it/database-management/Normal_Forms.pdf");
    assert_eq!(material.size, SizeKb(10));
    assert_eq!(
        material.download_url,
        "/files?path=/store/pdfs/semester-3/it/database-management/Normal_Forms.pdf"
    );
    assert!(
        format_catalog(&catalog)
            .iter()
            .any(|l| l.contains("Normal Forms  10KB"))
    );

    // Front-end fields survive the rewrite
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("store/catalog.json")).unwrap())
            .unwrap();
    assert_eq!(raw["semesters"][0]["branches"][0]["subjects"][0]["code"], "IT301");
    assert_eq!(raw["semesters"][0]["id"], 3);

    let path = material.path.clone();
    let response = library.delete(&RemovalRequest {
        semester: "3".to_string(),
        branch: "it".to_string(),
        subject: "dbms".to_string(),
        path: path.clone(),
    });
    assert!(response.success, "{}", response.message);
    assert!(!thumbnail.exists());
    assert!(!tmp.path().join(path.trim_start_matches('/')).exists());
    assert_eq!(library.catalog().unwrap().materials().count(), 0);
}

#[test]
fn broken_pdf_still_uploads_and_thumbnail_request_fails() {
    let tmp = site();
    let library = library(tmp.path());

    let response = library.upload(upload("broken.pdf", 300));
    assert!(response.success);
    assert_eq!(library.catalog().unwrap().materials().count(), 1);

    let path = library.catalog().unwrap().material_paths().remove(0);
    let err = library.ensure_thumbnail(&path, Some("webp")).unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Thumbnail(ThumbnailError::RenderFailed(_))
    ));
    let body = ActionResponse::from(&err);
    assert!(!body.success);
    assert_eq!(body.status, 500);
}

#[test]
fn unknown_subject_is_rejected_without_side_effects() {
    let tmp = site();
    let library = library(tmp.path());
    let mut request = upload("x.pdf", 10);
    request.subject = "networks".to_string();

    let err = library.add_material(request).unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Catalog(CatalogError::NotFound(_))
    ));
    assert_eq!(err.to_string(), "Subject not found");
    assert!(!tmp.path().join("store/pdfs").exists());
    assert!(!tmp.path().join("store/thumbs").exists());
}

#[test]
fn regenerate_then_prune_after_manual_catalog_edit() {
    let tmp = site();
    let library = library(tmp.path());
    library.upload(upload("a.pdf", 10));
    library.upload(upload("b.pdf", 10));

    // Drop one record by hand, the way an admin might edit the JSON
    let store = CatalogStore::new(tmp.path().join("store/catalog.json"));
    let mut catalog = store.load().unwrap();
    let subject = catalog.find_subject_mut("3", "it", "dbms").unwrap();
    subject.materials.as_mut().unwrap().retain(|m| m.path.ends_with("a.pdf"));
    store.persist(&catalog).unwrap();

    let stats = library
        .regenerate_thumbnails(Some(ThumbnailFormat::Png), false)
        .unwrap();
    assert_eq!(stats.generated, 1);

    let removed = library.prune_thumbnails().unwrap();
    assert_eq!(removed.len(), 1);
    let remaining = fs::read_dir(tmp.path().join("store/thumbs")).unwrap().count();
    assert_eq!(remaining, 2); // a.pdf as webp (upload) and png (regenerate)
}

#[test]
fn stock_config_without_file() {
    let tmp = TempDir::new().unwrap();
    let config = load_config(tmp.path()).unwrap();
    assert_eq!(config.storage.catalog, ShelfConfig::default().storage.catalog);
    assert_eq!(config.thumbnails.format, ThumbnailFormat::Png);
}
