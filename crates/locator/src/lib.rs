//! Runtime lookup of the bundled libusb
//!
//! A [`LibraryContext`] answers "where is libusb?" for one process: it looks
//! for a shared library staged next to the package, memoizes every answer,
//! and falls back to the operating system's library search when nothing was
//! bundled. On top of that it builds a memoized USB backend and a
//! [`LibraryContext::find_devices`] convenience.
//!
//! # Example
//!
//! ```no_run
//! use locator::{BackendChoice, DeviceFilter, LibraryContext};
//!
//! let context = LibraryContext::from_env();
//! if let Some(path) = context.library_path() {
//!     println!("bundled libusb: {}", path.display());
//! }
//! let devices = context.find_devices(&DeviceFilter::all(), BackendChoice::Default)?;
//! println!("{} device(s)", devices.len());
//! context.shutdown();
//! # Ok::<(), locator::LocatorError>(())
//! ```

pub mod backend;
pub mod bundle;
pub mod cache;
pub mod context;
pub mod devices;
pub mod error;
pub mod resources;
pub mod system;

pub use backend::{
    DeviceInfo, DynamicBackend, LIBUSB1_CANDIDATES, LibrarySource, SystemBackend, UsbBackend,
};
pub use bundle::{BundledBinary, collect_dynamic_libs};
pub use cache::{LibraryCache, Lookup, ResolvedLibrary};
pub use context::{BackendLoader, LibraryContext, PACKAGE_DIR_ENV, default_package_dir};
pub use devices::{BackendChoice, DeviceFilter};
pub use error::{LocatorError, Result};
