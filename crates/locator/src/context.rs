//! Library lookup context
//!
//! Owns every memoized answer for one process (or one test): resolved
//! library paths, the open handles that keep them available, and the USB
//! backend built on top of them. Call [`LibraryContext::shutdown`] when the
//! host process is done; dropping the context does the same.

use common::Platform;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::{
    DeviceInfo, DynamicBackend, LIBUSB1_CANDIDATES, LibrarySource, SystemBackend, UsbBackend,
};
use crate::cache::{LibraryCache, Lookup, ResolvedLibrary};
use crate::devices::{BackendChoice, DeviceFilter};
use crate::error::Result;
use crate::resources;
use crate::system;

/// Environment variable overriding the package directory
pub const PACKAGE_DIR_ENV: &str = "LIBUSB_PACKAGE_DIR";

/// Builds a backend from a located library
pub type BackendLoader = Box<dyn Fn(&LibrarySource) -> Result<Arc<dyn UsbBackend>> + Send + Sync>;

/// Memoized backend: `None` until first requested
type BackendSlot = Option<Option<Arc<dyn UsbBackend>>>;

pub struct LibraryContext {
    platform: Platform,
    package_dir: PathBuf,
    cache: LibraryCache,
    backend: Mutex<BackendSlot>,
    loader: BackendLoader,
    system_backend: Arc<dyn UsbBackend>,
    closed: AtomicBool,
}

impl LibraryContext {
    /// Context for `platform` looking for bundled libraries in `package_dir`
    pub fn new(platform: Platform, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            package_dir: package_dir.into(),
            cache: LibraryCache::new(),
            backend: Mutex::new(None),
            loader: Box::new(|source: &LibrarySource| {
                DynamicBackend::load(source).map(|b| Arc::new(b) as Arc<dyn UsbBackend>)
            }),
            system_backend: Arc::new(SystemBackend),
            closed: AtomicBool::new(false),
        }
    }

    /// Context for the host platform and the default package directory
    pub fn from_env() -> Self {
        Self::new(Platform::host(), default_package_dir())
    }

    /// Replace how backends are built from a located library
    pub fn with_loader(mut self, loader: BackendLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the backend used for [`BackendChoice::System`]
    pub fn with_system_backend(mut self, backend: Arc<dyn UsbBackend>) -> Self {
        self.system_backend = backend;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Path of the bundled libusb, if the package ships one
    ///
    /// The file is held open until [`LibraryContext::shutdown`].
    pub fn library_path(&self) -> Option<PathBuf> {
        self.entry(Lookup::Bundled, || {
            let path = self.package_dir.join(self.platform.library_file_name());
            path.is_file().then_some(path)
        })
        .map(|library| library.path().to_path_buf())
    }

    /// Path of the first bundled resource whose name starts with `candidate`
    ///
    /// On Linux `lib` + `candidate` also matches. Absence is not an error;
    /// callers fall back to the system search.
    pub fn resolve(&self, candidate: &str) -> Option<PathBuf> {
        self.resolved(candidate)
            .map(|library| library.path().to_path_buf())
    }

    /// Memoized entry behind [`LibraryContext::resolve`]
    ///
    /// Repeated calls with the same candidate return the same allocation.
    pub fn resolved(&self, candidate: &str) -> Option<Arc<ResolvedLibrary>> {
        self.entry(Lookup::Candidate(candidate.to_string()), || {
            resources::find_bundled(&self.package_dir, candidate, &self.platform)
        })
    }

    /// Library lookup callback for backends
    ///
    /// Without a bundled libusb, this is the operating system's search.
    /// With one, only bundled matches are returned.
    pub fn find_library(&self, candidate: &str) -> Option<LibrarySource> {
        if self.library_path().is_none() {
            // Nothing bundled: defer to the system search
            return system::find_library(candidate, &self.platform).map(LibrarySource::System);
        }

        self.resolve(candidate).map(LibrarySource::Bundled)
    }

    /// Memoized libusb-1.0 backend built through [`LibraryContext::find_library`]
    ///
    /// `None` if no candidate library was found or it failed to load; that
    /// outcome is memoized too.
    pub fn get_backend(&self) -> Option<Arc<dyn UsbBackend>> {
        let mut slot = self.backend_slot();
        if let Some(backend) = slot.as_ref() {
            return backend.clone();
        }

        let backend = self.build_backend();
        *slot = Some(backend.clone());
        backend
    }

    fn build_backend(&self) -> Option<Arc<dyn UsbBackend>> {
        let Some(source) = LIBUSB1_CANDIDATES
            .iter()
            .find_map(|candidate| self.find_library(candidate))
        else {
            warn!(
                "No libusb-1.0 library found (tried: {})",
                LIBUSB1_CANDIDATES.join(", ")
            );
            return None;
        };

        match (self.loader)(&source) {
            Ok(backend) => {
                info!("Using {} backend from {}", backend.name(), source);
                Some(backend)
            }
            Err(e) => {
                warn!("Unable to load libusb backend: {}", e);
                None
            }
        }
    }

    /// Find devices through the chosen backend
    ///
    /// [`BackendChoice::Default`] uses [`LibraryContext::get_backend`],
    /// falling back to the system backend when no library could be loaded.
    /// [`BackendChoice::System`] skips the bundled lookup entirely.
    pub fn find_devices(
        &self,
        filter: &DeviceFilter,
        backend: BackendChoice,
    ) -> Result<Vec<DeviceInfo>> {
        let backend = match backend {
            BackendChoice::Default => self
                .get_backend()
                .unwrap_or_else(|| Arc::clone(&self.system_backend)),
            BackendChoice::Explicit(backend) => backend,
            BackendChoice::System => Arc::clone(&self.system_backend),
        };

        debug!("Finding devices with {} backend: {:?}", backend.name(), filter);
        let devices = backend.devices()?;
        Ok(filter.apply(devices))
    }

    /// Release held library handles and the memoized backend
    ///
    /// Idempotent. Afterwards the context answers every lookup afresh.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.cache.clear();
        let backend = self.backend_slot().take();
        debug!(
            "Library context shut down: released {} lookups{}",
            released,
            if backend.flatten().is_some() { " and a backend" } else { "" }
        );
    }

    fn entry<F>(&self, key: Lookup, find: F) -> Option<Arc<ResolvedLibrary>>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        self.closed.store(false, Ordering::SeqCst);
        self.cache.get_or_resolve(key, find)
    }

    fn backend_slot(&self) -> MutexGuard<'_, BackendSlot> {
        self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for LibraryContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Package directory: `LIBUSB_PACKAGE_DIR`, else the executable's directory
pub fn default_package_dir() -> PathBuf {
    if let Some(dir) = env::var_os(PACKAGE_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::from_target_triple("x86_64-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn test_library_path() {
        let dir = TempDir::new().unwrap();
        let context = LibraryContext::new(linux(), dir.path());
        assert_eq!(context.library_path(), None);

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("libusb-1.0.so"), b"ELF").unwrap();
        let context = LibraryContext::new(linux(), dir.path());
        assert_eq!(
            context.library_path(),
            Some(dir.path().join("libusb-1.0.so"))
        );
    }

    #[test]
    fn test_find_library_prefers_bundled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("libusb-1.0.so"), b"ELF").unwrap();
        let context = LibraryContext::new(linux(), dir.path());

        assert_eq!(
            context.find_library("usb-1.0"),
            Some(LibrarySource::Bundled(dir.path().join("libusb-1.0.so")))
        );
        // Bundled package present, so no system fallback for other names
        assert_eq!(context.find_library("ftdi1"), None);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("libusb-1.0.so"), b"ELF").unwrap();
        let context = LibraryContext::new(linux(), dir.path());

        let first = context.resolved("usb-1.0").unwrap();
        context.shutdown();
        context.shutdown();

        let again = context.resolved("usb-1.0").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(first.path(), again.path());
    }

    #[test]
    fn test_default_package_dir_is_absolute_or_override() {
        let dir = default_package_dir();
        if env::var_os(PACKAGE_DIR_ENV).is_none() {
            assert!(dir.is_absolute() || dir == Path::new("."));
        }
    }
}
