//! Build artifact discovery and selection

use common::Platform;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List shared libraries in `dir` carrying the platform suffix
///
/// Mirrors a `*<suffix>` glob: only names ending in the suffix match, so
/// versioned names such as `libusb-1.0.so.0.3.0` are ignored. The result is
/// sorted by file name, which is the enumeration order used for tie-breaks.
/// A missing directory yields no candidates.
pub fn find_candidates(dir: &Path, platform: &Platform) -> io::Result<Vec<PathBuf>> {
    let suffix = platform.shared_library_suffix();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Output directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Symlinks count; the unversioned name is usually one
        if name.ends_with(suffix) && name.len() > suffix.len() && !path.is_dir() {
            candidates.push(path);
        }
    }

    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} candidate libraries in {}", candidates.len(), dir.display());
    Ok(candidates)
}

/// Pick the candidate with the shortest file name
///
/// The shortest name is taken to be the generic, unversioned library. Ties
/// keep the earliest candidate.
pub fn select_artifact(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .enumerate()
        .min_by_key(|(index, path)| (file_name_len(path), *index))
        .map(|(_, path)| path.clone())
}

fn file_name_len(path: &Path) -> usize {
    path.file_name().map(|n| n.len()).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::from_target_triple("x86_64-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn test_select_shortest() {
        let candidates = vec![
            PathBuf::from("out/libusb-1.0.so.0"),
            PathBuf::from("out/libusb-1.0.so"),
            PathBuf::from("out/libusb-1.0.so.0.3.0"),
        ];
        assert_eq!(
            select_artifact(&candidates),
            Some(PathBuf::from("out/libusb-1.0.so"))
        );
    }

    #[test]
    fn test_select_tie_keeps_first() {
        let candidates = vec![PathBuf::from("b/libfoo.so"), PathBuf::from("a/libbar.so")];
        assert_eq!(
            select_artifact(&candidates),
            Some(PathBuf::from("b/libfoo.so"))
        );
    }

    #[test]
    fn test_select_empty() {
        assert_eq!(select_artifact(&[]), None);
    }

    #[test]
    fn test_find_candidates_filters_suffix() {
        let dir = TempDir::new().unwrap();
        for name in [
            "libusb-1.0.so",
            "libusb-1.0.so.0.3.0",
            "libusb-1.0.la",
            "libusb-1.0.a",
            "libusb_1_0.so",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("subdir.so")).unwrap();

        let found = find_candidates(dir.path(), &linux()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["libusb-1.0.so", "libusb_1_0.so"]);
    }

    #[test]
    fn test_find_candidates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let found = find_candidates(&dir.path().join("nope"), &linux()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_candidates_per_platform() {
        let dir = TempDir::new().unwrap();
        for name in ["libusb-1.0.dylib", "libusb-1.0.0.dylib", "libusb-1.0.dll"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let mac = Platform::from_target_triple("aarch64-apple-darwin").unwrap();
        let found = find_candidates(dir.path(), &mac).unwrap();
        assert_eq!(found.len(), 2);
        assert!(select_artifact(&found).unwrap().ends_with("libusb-1.0.dylib"));

        let win = Platform::from_target_triple("x86_64-pc-windows-msvc").unwrap();
        let found = find_candidates(dir.path(), &win).unwrap();
        assert_eq!(found.len(), 1);
    }
}
