//! Build orchestration for the bundled libusb
//!
//! Drives the native libusb build for a [`common::Platform`], picks the
//! produced shared library and stages it into the package directory where
//! the runtime locator expects it.
//!
//! The whole pipeline is synchronous: each external toolchain step is run to
//! completion before the next one starts.

pub mod artifact;
pub mod config;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod staging;
pub mod steps;

pub use artifact::{find_candidates, select_artifact};
pub use config::{BuildConfig, StageMode};
pub use env::BuildEnv;
pub use error::{BuildError, Result};
pub use orchestrator::{BuildManifest, Orchestrator};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use staging::{StagedArtifact, stage, stage_with};
pub use steps::{BuildStep, StepKind, output_dir, plan_steps};
