//! Build orchestrator
//!
//! Runs the planned toolchain steps, picks the produced library and stages
//! it. [`Orchestrator::run_tolerant`] applies the packaging failure policy:
//! outside CI a failed build yields a package without a bundled library.

use common::Platform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::artifact::{find_candidates, select_artifact};
use crate::config::BuildConfig;
use crate::env::BuildEnv;
use crate::error::{BuildError, Result};
use crate::runner::CommandRunner;
use crate::staging::{StagedArtifact, stage};
use crate::steps::{BuildStep, output_dir, plan_steps};

/// What the orchestrator staged
///
/// Empty when the build was skipped after a tolerated failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Library file names placed into the package
    pub names: Vec<String>,
    /// Build outputs they were staged from
    pub paths: Vec<PathBuf>,
}

impl BuildManifest {
    fn record(&mut self, staged: &StagedArtifact) {
        self.names.push(staged.name.clone());
        self.paths.push(staged.source.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write the manifest as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Config(format!("Failed to serialize manifest: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}

/// Builds libusb for one platform and stages the result
pub struct Orchestrator<R: CommandRunner> {
    platform: Platform,
    config: BuildConfig,
    env: BuildEnv,
    runner: R,
}

impl<R: CommandRunner> Orchestrator<R> {
    /// Create an orchestrator
    ///
    /// Relative paths in `config` are resolved against the current directory
    /// here, since the toolchain runs inside the build directory.
    pub fn new(
        platform: Platform,
        mut config: BuildConfig,
        env: BuildEnv,
        runner: R,
    ) -> Result<Self> {
        config.paths.source_dir = std::path::absolute(&config.paths.source_dir)?;
        config.paths.build_dir = std::path::absolute(&config.paths.build_dir)?;
        config.paths.package_dir = std::path::absolute(&config.paths.package_dir)?;
        if let Some(dir) = config.paths.output_dir.take() {
            config.paths.output_dir = Some(std::path::absolute(dir)?);
        }

        Ok(Self {
            platform,
            config,
            env,
            runner,
        })
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The toolchain invocations [`Orchestrator::run`] will perform
    pub fn steps(&self) -> Vec<BuildStep> {
        plan_steps(&self.platform, &self.config, &self.env)
    }

    /// Build and stage, failing on any error
    pub fn run(&self) -> Result<BuildManifest> {
        info!("Building libusb for {}", self.platform);
        info!("build dir = {}", self.config.paths.build_dir.display());
        info!("package dir = {}", self.config.paths.package_dir.display());

        fs::create_dir_all(&self.config.paths.build_dir)?;

        for step in self.steps() {
            self.runner.run(&step)?;
        }

        let dir = output_dir(&self.platform, &self.config);
        let candidates = find_candidates(&dir, &self.platform)?;
        info!("Candidate libraries: {:?}", candidates);

        let artifact =
            select_artifact(&candidates).ok_or(BuildError::NoArtifactProduced { dir })?;
        let staged = stage(&artifact, &self.config.paths.package_dir, self.config.build.mode)?;

        let mut manifest = BuildManifest::default();
        manifest.record(&staged);
        info!("Staged {} at {}", staged.name, staged.destination.display());
        Ok(manifest)
    }

    /// Build and stage, tolerating toolchain failures outside CI
    ///
    /// Outside CI, [`BuildError::Toolchain`] and
    /// [`BuildError::NoArtifactProduced`] are logged and an empty manifest is
    /// returned. Everything else, and everything under CI, is returned as is.
    pub fn run_tolerant(&self) -> Result<BuildManifest> {
        match self.run() {
            Ok(manifest) => Ok(manifest),
            Err(e) if e.is_recoverable() && !self.env.ci => {
                warn!("{}", e);
                warn!("Continuing without a bundled libusb; the system library will be used");
                Ok(BuildManifest::default())
            }
            Err(e) => {
                error!("libusb build failed: {}", e);
                Err(e)
            }
        }
    }
}
