//! Build error types

use std::path::PathBuf;
use thiserror::Error;

use crate::steps::StepKind;

/// Errors raised while building and staging libusb
#[derive(Debug, Error)]
pub enum BuildError {
    /// An external toolchain step exited non-zero or could not be started
    #[error("{step} step failed: {message}")]
    Toolchain { step: StepKind, message: String },

    /// The toolchain finished but left no shared library behind
    #[error("libusb failed to build: no libraries found in {}", .dir.display())]
    NoArtifactProduced { dir: PathBuf },

    /// The artifact could not be placed into the package directory
    #[error("Failed to stage artifact at {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Whether a non-CI build may continue without a bundled library
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BuildError::Toolchain { .. } | BuildError::NoArtifactProduced { .. }
        )
    }
}

/// Type alias for build results
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuildError::Toolchain {
            step: StepKind::Configure,
            message: "exit status 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("configure"));
        assert!(msg.contains("exit status 1"));

        let err = BuildError::NoArtifactProduced {
            dir: PathBuf::from("/tmp/build/libusb/.libs"),
        };
        assert!(format!("{}", err).contains("/tmp/build/libusb/.libs"));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(
            BuildError::Toolchain {
                step: StepKind::Make,
                message: String::new(),
            }
            .is_recoverable()
        );
        assert!(
            BuildError::NoArtifactProduced {
                dir: PathBuf::new(),
            }
            .is_recoverable()
        );
        assert!(
            !BuildError::Staging {
                path: PathBuf::new(),
                source: std::io::Error::other("disk full"),
            }
            .is_recoverable()
        );
        assert!(!BuildError::Config("bad".to_string()).is_recoverable());
    }
}
