//! Bundled resource enumeration
//!
//! The package directory holds the staged library next to whatever else the
//! package ships. Only regular files that are not sources or metadata are
//! considered libraries.

use common::Platform;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions that never name a loadable library
const METADATA_EXTENSIONS: &[&str] = &[
    "rs", "toml", "lock", "json", "md", "txt", "h", "c", "pc", "la", "a", "lib", "pdb", "exp",
];

/// Whether `name` is a source or metadata file rather than a library
pub fn is_metadata_file(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => METADATA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Whether a resource called `name` satisfies a lookup for `candidate`
pub fn matches_candidate(name: &str, candidate: &str, platform: &Platform) -> bool {
    if candidate.is_empty() {
        return false;
    }
    name.starts_with(candidate)
        || (platform.accepts_lib_prefix()
            && name.strip_prefix("lib").is_some_and(|rest| rest.starts_with(candidate)))
}

/// Library-like files directly inside `dir`, sorted by file name
///
/// An unreadable or missing directory has no resources.
pub fn bundled_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No bundled resources in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| !is_metadata_file(name))
        })
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// First bundled file in `dir` matching `candidate`
pub fn find_bundled(dir: &Path, candidate: &str, platform: &Platform) -> Option<PathBuf> {
    bundled_files(dir).into_iter().find(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| matches_candidate(name, candidate, platform))
    })
}
