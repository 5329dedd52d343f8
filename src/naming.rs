//! Naming conventions for stored files.
//!
//! Uploaded files land at a path built from catalog ids and user-supplied
//! names. Everything that turns those inputs into path segments lives here so
//! the coordinator, the thumbnail generator, and the download resolver agree
//! on the same rules:
//!
//! - `Unit 1: Arrays & Lists.pdf` → `Unit_1_Arrays__Lists.pdf` (upload filename)
//! - `Data Structures` → `data-structures` (subject folder)
//! - `\data\notes\x.pdf` → `data/notes/x.pdf` (normalized storage path)

use std::path::{Component, Path};
use unicode_normalization::UnicodeNormalization;

/// Device names Windows refuses as file stems, checked case-insensitively.
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "AUX", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3", "PRN", "NUL",
];

/// Reduce an uploaded filename to a safe, flat file name.
///
/// Accented letters fold to their ASCII base (`résumé` → `resume`) and
/// other non-ASCII characters are dropped. Path separators and whitespace runs
/// become single underscores, anything outside `[A-Za-z0-9_.-]` is removed,
/// and leading/trailing dots and underscores are trimmed. The result never
/// contains a separator, so it cannot escape the target folder.
///
/// Returns an empty string when nothing usable is left (e.g. `"../../"`).
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or("");
    if !trimmed.is_empty()
        && WINDOWS_DEVICE_NAMES
            .iter()
            .any(|d| d.eq_ignore_ascii_case(stem))
    {
        return format!("_{trimmed}");
    }
    trimmed.to_string()
}

/// Folder segment for a subject: lowercased, spaces → hyphens.
///
/// Separators are removed as well so a subject name can never introduce an
/// extra directory level.
pub fn subject_folder(name: &str) -> String {
    name.replace(' ', "-")
        .to_lowercase()
        .chars()
        .filter(|c| *c != '/' && *c != '\\')
        .collect()
}

/// Normalize a storage path for hashing and filesystem lookup.
///
/// Backslashes become forward slashes and leading slashes are stripped, so
/// `/data/notes/a.pdf`, `data/notes/a.pdf`, and `\data\notes\a.pdf` all map
/// to `data/notes/a.pdf`.
pub fn normalize_storage_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// The catalog form of a storage path: forward slashes with one leading slash.
pub fn catalog_path(relative: &str) -> String {
    format!("/{}", normalize_storage_path(relative))
}

/// Whether a storage path tries to climb out of the site root.
pub fn escapes_root(path: &str) -> bool {
    Path::new(&normalize_storage_path(path))
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}
