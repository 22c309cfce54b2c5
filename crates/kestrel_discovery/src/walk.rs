//! Recursive spec-file walk.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::trace;
use walkdir::WalkDir;

use crate::pattern::PatternSet;

/// Walks `root` and returns every spec file matching `patterns`, keyed by
/// path relative to `root` and mapped to its absolute path.
///
/// Excluded directories are pruned without descending. A non-existent root
/// yields an empty map.
pub fn discover(root: &Path, patterns: &PatternSet) -> BTreeMap<PathBuf, PathBuf> {
    let mut found = BTreeMap::new();
    if !root.exists() {
        return found;
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !patterns.is_excluded(&normalized(entry.path())));

    for entry in walker {
        let Ok(entry) = entry else {
            // Unreadable entries are skipped, not fatal.
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let full_path = normalized(entry.path());
        if !patterns.is_included(&full_path) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let absolute =
            dunce::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());

        trace!(path = %relative.display(), "discovered spec file");
        found.insert(relative, absolute);
    }

    found
}

/// Path rendered with `/` separators for pattern matching.
fn normalized(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
