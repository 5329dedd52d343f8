//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Listings are **information-centric, not file-centric**. Every node leads
//! with its id and display name; storage paths and URLs are secondary context
//! on indented lines, so the listing reads as a content inventory while still
//! letting users trace a record back to its file.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! Semester 1
//!     cse Computer Science
//!         data-structures Data Structures (no materials)
//!         os Operating Systems (1 material)
//!             001 CPU Scheduling  512KB  2024-01-15
//!                 Path: /data/notes/semester-1/cse/operating-systems/Scheduling.pdf
//! ```
//!
//! ## Mutations
//!
//! `add` and `remove` print the [`ActionResponse`] as JSON on stdout, the
//! same body an HTTP handler would send.
//!
//! # Architecture
//!
//! Each listing has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::catalog::{Catalog, Material, NodeId};
use crate::library::ActionResponse;
use crate::thumbnail::RegenerateStats;
use serde_json::{Map, Value};
use std::path::PathBuf;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display name from the front-end `name` field, if any.
fn display_name(extra: &Map<String, Value>) -> Option<&str> {
    extra.get("name").and_then(Value::as_str)
}

/// `id Name`, or just the id when the node has no distinct name.
fn node_header(id: &NodeId, name: Option<&str>) -> String {
    match name {
        Some(n) if !n.is_empty() && n != id.to_string() => format!("{} {}", id, n),
        _ => id.to_string(),
    }
}

fn material_count(n: usize) -> String {
    match n {
        0 => "no materials".to_string(),
        1 => "1 material".to_string(),
        n => format!("{} materials", n),
    }
}

/// Format a material line with size and upload date.
///
/// ```text
/// 001 CPU Scheduling  512KB  2024-01-15
/// ```
fn material_line(index: usize, material: &Material) -> String {
    format!(
        "{} {}  {}  {}",
        format_index(index),
        material.title,
        material.size,
        material.upload_date
    )
}

// ============================================================================
// List
// ============================================================================

/// Format the catalog tree: semesters, branches, subjects, materials.
pub fn format_catalog(catalog: &Catalog) -> Vec<String> {
    let mut lines = Vec::new();

    if catalog.semesters.is_empty() {
        lines.push("(empty catalog)".to_string());
        return lines;
    }

    for semester in &catalog.semesters {
        let header = match display_name(&semester.extra) {
            Some(name) => name.to_string(),
            None => format!("Semester {}", semester.id),
        };
        lines.push(header);

        for branch in &semester.branches {
            lines.push(format!(
                "{}{}",
                indent(1),
                node_header(&branch.id, display_name(&branch.extra))
            ));

            for subject in &branch.subjects {
                let materials = subject.materials();
                lines.push(format!(
                    "{}{} ({})",
                    indent(2),
                    node_header(&subject.id, Some(subject.name.as_str())),
                    material_count(materials.len())
                ));
                for (i, material) in materials.iter().enumerate() {
                    lines.push(format!("{}{}", indent(3), material_line(i + 1, material)));
                    lines.push(format!("{}Path: {}", indent(4), material.path));
                }
            }
        }
    }

    let total = catalog.materials().count();
    lines.push(String::new());
    lines.push(format!("{} total", material_count(total)));
    lines
}

pub fn print_catalog(catalog: &Catalog) {
    for line in format_catalog(catalog) {
        println!("{}", line);
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// Pretty JSON body of an operation result.
pub fn format_response(response: &ActionResponse) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|_| {
        format!(
            "{{\"success\": {}, \"message\": {:?}}}",
            response.success, response.message
        )
    })
}

pub fn print_response(response: &ActionResponse) {
    println!("{}", format_response(response));
}

/// Summary line for a batch regeneration.
pub fn format_regenerate(stats: &RegenerateStats) -> String {
    format!("Thumbnails: {}", stats)
}

/// One line per deleted orphan, then a count.
pub fn format_pruned(removed: &[PathBuf]) -> Vec<String> {
    let mut lines: Vec<String> = removed
        .iter()
        .map(|path| format!("{}removed {}", indent(1), path.display()))
        .collect();
    let noun = if removed.len() == 1 {
        "thumbnail"
    } else {
        "thumbnails"
    };
    lines.push(format!("Pruned {} orphaned {}", removed.len(), noun));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn catalog_listing_shows_hierarchy() {
        let lines = format_catalog(&fixture_catalog());
        assert_eq!(lines[0], "Semester 1");
        assert_eq!(lines[1], "    cse Computer Science");
        assert_eq!(lines[2], "        data-structures Data Structures (no materials)");
        assert_eq!(lines[3], "        os Operating Systems (1 material)");
        assert_eq!(lines[4], "            001 CPU Scheduling  512KB  2024-01-15");
        assert_eq!(
            lines[5],
            format!("                Path: {}", FIXTURE_MATERIAL_PATH)
        );
    }

    #[test]
    fn catalog_listing_falls_back_to_ids() {
        let lines = format_catalog(&fixture_catalog());
        // Semester 2's branch has no name
        let pos = lines.iter().position(|l| l == "Semester 2").unwrap();
        assert_eq!(lines[pos + 1], "    cse");
        assert_eq!(lines.last().unwrap(), "1 material total");
    }

    #[test]
    fn empty_catalog_listing() {
        let catalog = Catalog::parse(r#"{"semesters": []}"#).unwrap();
        assert_eq!(format_catalog(&catalog), vec!["(empty catalog)"]);
    }

    #[test]
    fn response_is_json() {
        let response = ActionResponse::ok("PDF uploaded and notes updated.")
            .with_thumbnail("/data/thumbnails/a.png");
        let text = format_response(&response);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["thumbnailUrl"], "/data/thumbnails/a.png");
    }

    #[test]
    fn regenerate_summary() {
        let stats = RegenerateStats {
            generated: 2,
            skipped: 1,
            failed: 0,
        };
        assert_eq!(
            format_regenerate(&stats),
            "Thumbnails: 2 generated, 1 skipped, 0 failed (3 total)"
        );
    }

    #[test]
    fn pruned_listing_counts() {
        let lines = format_pruned(&[PathBuf::from("data/thumbnails/a.png")]);
        assert_eq!(
            lines,
            vec![
                "    removed data/thumbnails/a.png".to_string(),
                "Pruned 1 orphaned thumbnail".to_string()
            ]
        );
        assert_eq!(format_pruned(&[]), vec!["Pruned 0 orphaned thumbnails"]);
    }
}
