//! Resolved path cache
//!
//! Each lookup key is resolved at most once. A hit opens the file and keeps
//! the handle, so the resource stays available until the cache is cleared.
//! Resolution and the open happen under the cache lock.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// What a cache entry answers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// The platform's `libusb-1.0` library file
    Bundled,
    /// First bundled resource whose name starts with the candidate
    Candidate(String),
}

/// A bundled library held open for the cache's lifetime
#[derive(Debug)]
pub struct ResolvedLibrary {
    path: PathBuf,
    _handle: File,
}

impl ResolvedLibrary {
    /// Open `path`, recording it in absolute form
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let handle = File::open(path)?;
        Ok(Self {
            path: std::path::absolute(path)?,
            _handle: handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

type Entry = Option<Arc<ResolvedLibrary>>;

/// Memo of lookup results, absent results included
#[derive(Debug, Default)]
pub struct LibraryCache {
    entries: Mutex<HashMap<Lookup, Entry>>,
}

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached answer for `key`, computing it with `find` once
    ///
    /// A path that `find` returns but that cannot be opened is cached as
    /// absent.
    pub fn get_or_resolve<F>(&self, key: Lookup, find: F) -> Entry
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(&key) {
            return entry.clone();
        }

        let resolved = find().and_then(|path| match ResolvedLibrary::open(&path) {
            Ok(library) => {
                debug!("Resolved {:?} to {}", key, library.path().display());
                Some(Arc::new(library))
            }
            Err(e) => {
                warn!("Found {} but could not open it: {}", path.display(), e);
                None
            }
        });

        entries.insert(key, resolved.clone());
        resolved
    }

    /// Cached answer for `key`, if it was resolved before
    pub fn get(&self, key: &Lookup) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    /// Number of resolved keys, absent results included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, releasing handles not shared elsewhere
    ///
    /// Returns the number of entries that were held.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Lookup, Entry>> {
        // Entries are inserted whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_once() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("libusb-1.0.so");
        std::fs::write(&lib, b"ELF").unwrap();

        let cache = LibraryCache::new();
        let calls = AtomicUsize::new(0);
        let find = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(lib.clone())
        };

        let first = cache.get_or_resolve(Lookup::Bundled, find).unwrap();
        let second = cache.get_or_resolve(Lookup::Bundled, find).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.path(), lib.as_path());
    }

    #[test]
    fn test_absent_is_cached() {
        let cache = LibraryCache::new();
        let calls = AtomicUsize::new(0);
        let find = || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };

        let key = Lookup::Candidate("nonexistent-lib".to_string());
        assert!(cache.get_or_resolve(key.clone(), find).is_none());
        assert!(cache.get_or_resolve(key.clone(), find).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(cache.get(&key), Some(None)));
    }

    #[test]
    fn test_unopenable_path_is_absent() {
        let dir = TempDir::new().unwrap();
        let cache = LibraryCache::new();
        let missing = dir.path().join("libusb-1.0.so");

        assert!(cache.get_or_resolve(Lookup::Bundled, || Some(missing)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = LibraryCache::new();
        cache.get_or_resolve(Lookup::Candidate("a".to_string()), || None);
        cache.get_or_resolve(Lookup::Candidate("b".to_string()), || None);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_resolution_happens_once() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("libusb-1.0.so");
        std::fs::write(&lib, b"ELF").unwrap();

        let cache = Arc::new(LibraryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let lib = lib.clone();
                thread::spawn(move || {
                    cache.get_or_resolve(Lookup::Bundled, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Some(lib)
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
    }
}
