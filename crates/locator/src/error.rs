//! Locator error types
//!
//! A missing bundled library is never an error; these cover loading a
//! library that was found and talking to it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocatorError {
    /// None of the candidate names resolved to a library
    #[error("No libusb library found (tried: {candidates})")]
    LibraryNotFound { candidates: String },

    #[error("Failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Symbol {symbol} missing from {}: {source}", .path.display())]
    Symbol {
        symbol: &'static str,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A libusb call returned a negative error code
    #[error("{call} failed with libusb error {code}")]
    Libusb { call: &'static str, code: i32 },

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LocatorError::Libusb {
            call: "libusb_init",
            code: -3,
        };
        assert_eq!(err.to_string(), "libusb_init failed with libusb error -3");

        let err = LocatorError::LibraryNotFound {
            candidates: "usb-1.0, libusb-1.0, usb".to_string(),
        };
        assert!(err.to_string().contains("libusb-1.0"));
    }
}
