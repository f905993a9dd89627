//! On-disk layout for revision snapshots and current-content exports.
//!
//! Snapshot filenames are derived from the revision's modification timestamp
//! only, so a re-run recomputes the same names and overwrites files in place
//! instead of duplicating them.

use crate::drive::Revision;
use crate::error::Result;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Ceiling for sanitized titles, minus room for a timestamp prefix and
/// extension (21 characters).
const MAX_FILENAME_LEN: usize = 200;
const FILENAME_RESERVE: usize = 21;

/// Snapshot filename for a revision: the modification timestamp with `:`
/// and `.` replaced so it is safe on every filesystem.
///
/// `2025-07-30T07:18:16.081Z` becomes `2025-07-30T07-18-16-081Z.txt`.
pub fn revision_filename(modified_date: &str) -> String {
    format!("{}.txt", modified_date.replace([':', '.'], "-"))
}

/// Write one revision snapshot under `base/folder/`, overwriting silently.
pub fn write_revision(
    base: &Path,
    folder: &str,
    revision: &Revision,
    content: &[u8],
) -> Result<PathBuf> {
    let dir = base.join(folder);
    fs::create_dir_all(&dir)?;
    let path = dir.join(revision_filename(&revision.modified_date));
    fs::write(&path, content)?;
    Ok(path)
}

/// Write the current-content export, named `{timestamp}_{title}.txt`.
pub fn write_export(exports_dir: &Path, title: &str, content: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(exports_dir)?;
    let filename = format!("{}_{}.txt", export_timestamp(), sanitize_title(title));
    let path = exports_dir.join(filename);
    fs::write(&path, content)?;
    Ok(path)
}

/// Current UTC time formatted for export filenames.
fn export_timestamp() -> String {
    Utc::now().format("%Y-%m-%d-%H%M%S").to_string()
}

/// Make a document title safe to use as a file name: anything that is not
/// alphanumeric, `.` or `-` collapses into a single `_`; an empty result
/// becomes `untitled`; overlong titles are truncated.
pub fn sanitize_title(title: &str) -> String {
    let mut safe = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars() {
        if c.is_alphanumeric() || c == '.' || c == '-' {
            if pending_separator && !safe.is_empty() {
                safe.push('_');
            }
            safe.push(c);
            pending_separator = false;
        } else {
            pending_separator = true;
        }
    }

    let allowed = MAX_FILENAME_LEN - FILENAME_RESERVE;
    if safe.chars().count() > allowed {
        safe = safe.chars().take(allowed).collect();
    }

    if safe.is_empty() {
        "untitled".to_string()
    } else {
        safe
    }
}

/// Number of `.txt` snapshots archived under a document folder.
pub fn snapshot_count(base: &Path, folder: &str) -> usize {
    match fs::read_dir(base.join(folder)) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext == "txt")
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}
