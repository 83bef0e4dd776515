//! Common utilities for libusb-package
//!
//! This crate provides functionality shared between the build orchestrator
//! and the runtime library locator: the platform descriptor that drives all
//! platform branching, error handling, and logging setup.

pub mod error;
pub mod logging;
pub mod platform;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use platform::{LIBRARY_STEM, Os, Platform, ToolchainKind};
