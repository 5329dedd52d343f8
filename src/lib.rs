//! # Notes Shelf
//!
//! Storage backend for a study-notes site. Administrators upload PDFs; the
//! shelf files them into a fixed hierarchy (semester → branch → subject →
//! material), renders a first-page thumbnail for each, and keeps a JSON
//! catalog the front end reads.
//!
//! # Architecture: Three Artifacts, One Coordinator
//!
//! Every material exists three times over, and they must agree:
//!
//! ```text
//! data/notes-data.json                               ← catalog record
//! data/notes/semester-1/cse/data-structures/x.pdf    ← the upload
//! data/thumbnails/<sha256 of path>.png               ← preview
//! ```
//!
//! Only [`library::MaterialLibrary`] touches more than one of them. The
//! [`catalog`] and [`thumbnail`] modules each own a single artifact and know
//! nothing about each other, so they can be tested in isolation: catalog
//! logic without image encoding, thumbnail logic without a catalog.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Typed catalog tree, subject lookup, atomic JSON persistence |
//! | [`thumbnail`] | First-page rendering via `pdftoppm`, path-addressed thumbnail files |
//! | [`library`] | Add/remove coordinator, lazy thumbnails, downloads, structured responses |
//! | [`config`] | `config.toml` loading, validation, and merging over stock defaults |
//! | [`naming`] | Filename sanitization, subject folders, storage-path normalization |
//! | [`output`] | CLI output formatting: catalog listing and operation results |
//!
//! # Design Decisions
//!
//! ## The Catalog Is a File
//!
//! No database. Each mutation loads the whole JSON file, changes it in
//! memory, and writes it back through a temp file and rename. Readers never
//! see a truncated catalog. There is no locking either: with concurrent
//! writers the last rename wins, which is acceptable for a single admin.
//!
//! ## Thumbnails Never Fail an Upload
//!
//! A preview is a convenience derived from the PDF. Rendering problems (no
//! `pdftoppm` installed, an encrypted or malformed PDF) are logged and the
//! upload still succeeds. The catalog always records the thumbnail URL;
//! [`library::MaterialLibrary::ensure_thumbnail`] renders it on first request
//! if the upload-time attempt failed.
//!
//! ## Path-Addressed Thumbnails
//!
//! A thumbnail's file name is the SHA-256 of its PDF's storage path. Two
//! PDFs with the same file name in different subjects get different
//! thumbnails, and no lookup table is needed to find one.
//!
//! ## Unknown Fields Survive
//!
//! The front end stores its own fields (display names, icons) in the same
//! catalog. Every record keeps what it does not understand and writes it back
//! after its own fields, with the unknown fields in their original relative
//! order.

pub mod catalog;
pub mod config;
pub mod library;
pub mod naming;
pub mod output;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_helpers;
