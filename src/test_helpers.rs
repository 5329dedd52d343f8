//! Shared test utilities for the notes-shelf test suite.
//!
//! Provides a fixture catalog, a site-root builder, and lookup helpers that
//! work with the typed catalog (`Catalog`, `Subject`, `Material`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_site();
//! let catalog = read_catalog(tmp.path());
//!
//! assert_eq!(subject_titles(&catalog, "1", "cse", "os"), vec!["CPU Scheduling"]);
//! let material = find_material(&catalog, FIXTURE_MATERIAL_PATH);
//! assert_eq!(material.size.0, 512);
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::catalog::{Catalog, CatalogStore, Material};
use crate::naming::normalize_storage_path;

// =========================================================================
// Fixture setup
// =========================================================================

/// Catalog location under the site root (the stock default).
pub const FIXTURE_CATALOG_PATH: &str = "data/notes-data.json";

/// Storage path of the one material the fixture ships with.
pub const FIXTURE_MATERIAL_PATH: &str =
    "/data/notes/semester-1/cse/operating-systems/Scheduling.pdf";

/// Two semesters, mixed numeric and string ids, one existing material, and
/// front-end fields (`name`, `icon`, `pages`) the crate does not interpret.
pub const FIXTURE_CATALOG: &str = r#"{
  "semesters": [
    {
      "id": 1,
      "name": "Semester 1",
      "branches": [
        {
          "id": "cse",
          "name": "Computer Science",
          "subjects": [
            { "id": "data-structures", "name": "Data Structures", "icon": "tree" },
            {
              "id": "os",
              "name": "Operating Systems",
              "materials": [
                {
                  "title": "CPU Scheduling",
                  "description": "FCFS, SJF, round robin",
                  "path": "/data/notes/semester-1/cse/operating-systems/Scheduling.pdf",
                  "type": "pdf",
                  "size": "512KB",
                  "uploadDate": "2024-01-15",
                  "downloadUrl": "/api/download?path=/data/notes/semester-1/cse/operating-systems/Scheduling.pdf",
                  "thumbnailUrl": "/data/thumbnails/scheduling.png",
                  "pages": 12
                }
              ]
            }
          ]
        },
        {
          "id": "ece",
          "name": "Electronics",
          "subjects": [
            { "id": "signals", "name": "Signals and Systems" }
          ]
        }
      ]
    },
    {
      "id": "2",
      "name": "Semester 2",
      "branches": [
        {
          "id": "cse",
          "subjects": [
            { "id": "dbms", "name": "Database Systems" }
          ]
        }
      ]
    }
  ]
}
"#;

pub fn fixture_catalog() -> Catalog {
    Catalog::parse(FIXTURE_CATALOG).unwrap()
}

/// A site root holding the fixture catalog and the fixture material's PDF.
///
/// Tests get an isolated copy they can mutate without affecting each other.
pub fn setup_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let catalog = tmp.path().join(FIXTURE_CATALOG_PATH);
    fs::create_dir_all(catalog.parent().unwrap()).unwrap();
    fs::write(&catalog, FIXTURE_CATALOG).unwrap();
    write_pdf(tmp.path(), FIXTURE_MATERIAL_PATH, 512 * 1024);
    tmp
}

/// Write a fake PDF of `len` bytes at a storage path under `root`.
pub fn write_pdf(root: &Path, storage_path: &str, len: usize) {
    let path = root.join(normalize_storage_path(storage_path));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(len.max(bytes.len()), b'0');
    fs::write(path, bytes).unwrap();
}

// =========================================================================
// Lookup helpers
// =========================================================================

pub fn read_catalog(root: &Path) -> Catalog {
    CatalogStore::new(root.join(FIXTURE_CATALOG_PATH))
        .load()
        .unwrap()
}

/// Find a material anywhere in the catalog by storage path. Panics if missing.
pub fn find_material<'a>(catalog: &'a Catalog, path: &str) -> &'a Material {
    catalog
        .materials()
        .find(|m| m.path == path)
        .unwrap_or_else(|| {
            let paths: Vec<_> = catalog.materials().map(|m| &m.path).collect();
            panic!("material '{}' not found. Available: {:?}", path, paths)
        })
}

/// Titles of a subject's materials, in catalog order.
pub fn subject_titles(catalog: &Catalog, semester: &str, branch: &str, subject: &str) -> Vec<String> {
    catalog
        .find_subject(semester, branch, subject)
        .unwrap()
        .materials()
        .iter()
        .map(|m| m.title.clone())
        .collect()
}
