//! The JSON catalog: typed tree, lookups, and durable storage.
//!
//! ## Shape
//!
//! ```text
//! Catalog
//! └── Semester  (id: number or string, compared as string)
//!     └── Branch   (id: exact match)
//!         └── Subject  (id: exact match, name → upload folder)
//!             └── Material  (identity = storage path)
//! ```
//!
//! The catalog is parsed into explicit record types at load time, so a
//! malformed file is rejected up front as [`CatalogError::Corrupt`] instead of
//! failing halfway through a lookup. Every record also carries an `extra` map
//! holding fields this crate does not interpret (display names, icons, codes
//! the front end reads). They are written back with their values and their
//! relative order intact, after the fields the record declares.
//!
//! ## Durability
//!
//! [`CatalogStore::persist`] writes the whole tree to a sibling temp file and
//! renames it over the catalog. There is no locking: concurrent writers race
//! and the last rename wins.

use crate::naming::normalize_storage_path;
use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Corrupt catalog: {0}")]
    Corrupt(String),
    #[error("{0} not found")]
    NotFound(Level),
    #[error("Material not found")]
    MaterialNotFound,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hierarchy level named by a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Semester,
    Branch,
    Subject,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Semester => "Semester",
            Level::Branch => "Branch",
            Level::Subject => "Subject",
        })
    }
}

// ============================================================================
// Scalar types
// ============================================================================

/// Node identifier as it appears in the catalog: `1` or `"cse"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Number(i64),
    Text(String),
}

impl NodeId {
    /// Exact match: only a string id equal to `id`.
    pub fn is(&self, id: &str) -> bool {
        matches!(self, NodeId::Text(text) if text == id)
    }

    /// String-compared match: `1` and `"1"` both match `"1"`.
    pub fn is_loosely(&self, id: &str) -> bool {
        match self {
            NodeId::Number(n) => n.to_string() == id,
            NodeId::Text(text) => text == id,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Number(n) => write!(f, "{n}"),
            NodeId::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::Text(id.to_string())
    }
}

/// File size in whole kilobytes, stored as `"<n>KB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SizeKb(pub u64);

impl SizeKb {
    /// Floor-divided kilobytes of a byte count.
    pub fn from_bytes(bytes: u64) -> Self {
        Self(bytes / 1024)
    }
}

impl fmt::Display for SizeKb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}KB", self.0)
    }
}

impl Serialize for SizeKb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SizeKb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Kilobytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Kilobytes(kb) => Ok(SizeKb(kb)),
            Raw::Text(text) => {
                let trimmed = text.trim();
                let digits = trimmed
                    .strip_suffix("KB")
                    .or_else(|| trimmed.strip_suffix("kb"))
                    .unwrap_or(trimmed)
                    .trim();
                digits
                    .parse()
                    .map(SizeKb)
                    .map_err(|_| de::Error::custom(format!("invalid size: {text:?}")))
            }
        }
    }
}

/// Material type; PDFs are the only kind uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    #[default]
    Pdf,
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub semesters: Vec<Semester>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: NodeId,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: NodeId,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: NodeId,
    pub name: String,
    /// Absent until the first upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<Vec<Material>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub title: String,
    pub description: String,
    /// Root-relative storage path with a leading slash.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    pub size: SizeKb,
    pub upload_date: NaiveDate,
    pub download_url: String,
    pub thumbnail_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Material {
    /// Whether this record names the file at `path`, compared verbatim or
    /// after normalizing slashes.
    pub fn is_stored_at(&self, path: &str) -> bool {
        self.path == path || normalize_storage_path(&self.path) == normalize_storage_path(path)
    }
}

/// Where a material lives in the tree, by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialLocation {
    pub semester: NodeId,
    pub branch: NodeId,
    pub subject: NodeId,
}

impl MaterialLocation {
    /// Whether this is the subject a `(semester, branch, subject)` lookup resolves to.
    pub fn is(&self, semester: &str, branch: &str, subject: &str) -> bool {
        self.semester.is_loosely(semester) && self.branch.is(branch) && self.subject.is(subject)
    }
}

impl fmt::Display for MaterialLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "semester {} / {} / {}",
            self.semester, self.branch, self.subject
        )
    }
}

impl Catalog {
    /// Parse and validate catalog JSON.
    pub fn parse(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            serde_json::from_str(json).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check id uniqueness at every level and storage-path uniqueness
    /// across the whole catalog.
    pub fn validate(&self) -> Result<(), CatalogError> {
        ensure_unique(self.semesters.iter().map(|s| &s.id), "semester ids")?;
        for semester in &self.semesters {
            let scope = format!("branch ids in semester {}", semester.id);
            ensure_unique(semester.branches.iter().map(|b| &b.id), &scope)?;
            for branch in &semester.branches {
                let scope = format!("subject ids in semester {} / {}", semester.id, branch.id);
                ensure_unique(branch.subjects.iter().map(|s| &s.id), &scope)?;
            }
        }

        let mut paths = HashSet::new();
        for material in self.materials() {
            if !paths.insert(normalize_storage_path(&material.path)) {
                return Err(CatalogError::Corrupt(format!(
                    "duplicate material path: {}",
                    material.path
                )));
            }
        }
        Ok(())
    }

    /// Resolve a subject, short-circuiting at the first level that misses.
    pub fn find_subject(
        &self,
        semester: &str,
        branch: &str,
        subject: &str,
    ) -> Result<&Subject, CatalogError> {
        debug!(semester, branch, subject, "resolving subject");
        self.semesters
            .iter()
            .find(|s| s.id.is_loosely(semester))
            .ok_or(CatalogError::NotFound(Level::Semester))?
            .branches
            .iter()
            .find(|b| b.id.is(branch))
            .ok_or(CatalogError::NotFound(Level::Branch))?
            .subjects
            .iter()
            .find(|s| s.id.is(subject))
            .ok_or(CatalogError::NotFound(Level::Subject))
    }

    /// Mutable variant of [`find_subject`](Self::find_subject).
    pub fn find_subject_mut(
        &mut self,
        semester: &str,
        branch: &str,
        subject: &str,
    ) -> Result<&mut Subject, CatalogError> {
        self.semesters
            .iter_mut()
            .find(|s| s.id.is_loosely(semester))
            .ok_or(CatalogError::NotFound(Level::Semester))?
            .branches
            .iter_mut()
            .find(|b| b.id.is(branch))
            .ok_or(CatalogError::NotFound(Level::Branch))?
            .subjects
            .iter_mut()
            .find(|s| s.id.is(subject))
            .ok_or(CatalogError::NotFound(Level::Subject))
    }

    /// Every material in catalog order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.semesters
            .iter()
            .flat_map(|s| &s.branches)
            .flat_map(|b| &b.subjects)
            .flat_map(|s| s.materials())
    }

    pub fn material_paths(&self) -> Vec<String> {
        self.materials().map(|m| m.path.clone()).collect()
    }

    /// Find which subject holds the material stored at `path`.
    pub fn locate_material(&self, path: &str) -> Option<MaterialLocation> {
        for semester in &self.semesters {
            for branch in &semester.branches {
                for subject in &branch.subjects {
                    if subject.materials().iter().any(|m| m.is_stored_at(path)) {
                        return Some(MaterialLocation {
                            semester: semester.id.clone(),
                            branch: branch.id.clone(),
                            subject: subject.id.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}

fn ensure_unique<'a>(
    ids: impl Iterator<Item = &'a NodeId>,
    scope: &str,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            return Err(CatalogError::Corrupt(format!("duplicate {scope}: {id}")));
        }
    }
    Ok(())
}

impl Subject {
    pub fn materials(&self) -> &[Material] {
        self.materials.as_deref().unwrap_or_default()
    }

    /// Append a material, creating the list on first use.
    pub fn add_material(&mut self, material: Material) {
        self.materials.get_or_insert_with(Vec::new).push(material);
    }

    /// Replace the material stored at the same path, or append.
    ///
    /// Returns the replaced record, if any.
    pub fn upsert_material(&mut self, material: Material) -> Option<Material> {
        let materials = self.materials.get_or_insert_with(Vec::new);
        match materials.iter_mut().find(|m| m.is_stored_at(&material.path)) {
            Some(existing) => Some(std::mem::replace(existing, material)),
            None => {
                materials.push(material);
                None
            }
        }
    }

    /// Remove the material stored at `path`.
    ///
    /// Matches the stored string verbatim, or after slash normalization, so
    /// hand-edited records without a leading slash can still be removed.
    pub fn remove_material(&mut self, path: &str) -> Result<Material, CatalogError> {
        let materials = self
            .materials
            .as_mut()
            .ok_or(CatalogError::MaterialNotFound)?;
        let index = materials
            .iter()
            .position(|m| m.is_stored_at(path))
            .ok_or(CatalogError::MaterialNotFound)?;
        Ok(materials.remove(index))
    }
}

// ============================================================================
// Storage
// ============================================================================

/// The catalog file on disk.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the catalog. A missing file is an I/O error.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let json = fs::read_to_string(&self.path)?;
        Catalog::parse(&json).map_err(|e| match e {
            CatalogError::Corrupt(reason) => {
                CatalogError::Corrupt(format!("{}: {reason}", self.path.display()))
            }
            other => other,
        })
    }

    /// Write the whole tree, pretty-printed, replacing the file atomically.
    pub fn persist(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let mut json = serde_json::to_string_pretty(catalog)?;
        json.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(catalog = %self.path.display(), "catalog persisted");
        Ok(())
    }
}
