//! Packaging inspection hook
//!
//! Single-file repackagers need to know which native libraries ship with the
//! package. Every dynamic library under the install root is listed with the
//! package root as its destination.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Destination of every bundled binary, relative to the package
pub const PACKAGE_ROOT: &str = ".";

/// A native library to embed, and where it goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundledBinary {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// List every dynamic library below `root`, sorted by path
///
/// A missing root has nothing to bundle.
pub fn collect_dynamic_libs(root: &Path) -> io::Result<Vec<BundledBinary>> {
    let mut found = Vec::new();
    if root.is_dir() {
        walk(root, &mut found)?;
    }
    found.sort();

    Ok(found
        .into_iter()
        .map(|source| BundledBinary {
            source,
            destination: PathBuf::from(PACKAGE_ROOT),
        })
        .collect())
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            walk(&path, found)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_dynamic_library)
        {
            found.push(path);
        }
    }
    Ok(())
}

/// `.so`, `.so.N...`, `.dylib` and `.dll` names
pub fn is_dynamic_library(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".dylib") || lower.ends_with(".dll") || lower.ends_with(".so") {
        return true;
    }
    match lower.split_once(".so.") {
        Some((stem, version)) => {
            !stem.is_empty()
                && version
                    .split('.')
                    .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dynamic_library_names() {
        assert!(is_dynamic_library("libusb-1.0.so"));
        assert!(is_dynamic_library("libusb-1.0.so.0"));
        assert!(is_dynamic_library("libusb-1.0.so.0.3.0"));
        assert!(is_dynamic_library("libusb-1.0.dylib"));
        assert!(is_dynamic_library("libusb-1.0.DLL"));
        assert!(!is_dynamic_library("libusb-1.0.la"));
        assert!(!is_dynamic_library("libusb-1.0.so.bak"));
        assert!(!is_dynamic_library("README.md"));
    }

    #[test]
    fn test_collect_walks_recursively() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("libusb_package");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("libusb-1.0.so"), b"ELF").unwrap();
        fs::write(nested.join("libusb-1.0.la"), b"libtool").unwrap();
        fs::write(root.path().join("other.dll"), b"MZ").unwrap();

        let libs = collect_dynamic_libs(root.path()).unwrap();
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[0].source, nested.join("libusb-1.0.so"));
        assert_eq!(libs[1].source, root.path().join("other.dll"));
        assert!(libs.iter().all(|b| b.destination == Path::new(".")));
    }

    #[test]
    fn test_collect_missing_root() {
        let root = TempDir::new().unwrap();
        assert!(collect_dynamic_libs(&root.path().join("gone")).unwrap().is_empty());
    }
}
