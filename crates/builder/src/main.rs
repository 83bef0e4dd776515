//! libusb-package build command
//!
//! Builds the bundled libusb for the host (or a given target triple) and
//! stages it into the package directory.

use anyhow::{Context, Result};
use builder::{BuildConfig, BuildEnv, Orchestrator, StageMode, SystemRunner};
use clap::{Parser, Subcommand};
use common::{Platform, setup_logging};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "libusb-package-build")]
#[command(
    author,
    version,
    about = "Build libusb and stage it for packaging"
)]
#[command(long_about = "
Builds the native libusb library from source and places the resulting
shared library into the package directory, where the runtime locator
finds it.

EXAMPLES:
    # Build with default config
    libusb-package-build build

    # Development build, symlinking the library into the package
    libusb-package-build build --in-place

    # Show the toolchain commands without running them
    libusb-package-build plan --target aarch64-apple-darwin

ENVIRONMENT:
    CI          Build failures abort packaging instead of producing a
                package without a bundled library
    ARCHFLAGS   Architecture override, e.g. '-arch arm64'
    MSYSTEM     Set by MSYS shells; script paths are passed in POSIX form
    RUST_LOG    Log filter, overrides --log-level

CONFIGURATION:
    The build looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/libusb-package/build.toml
    3. ./libusb-package.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build libusb and stage it into the package directory
    Build {
        #[command(flatten)]
        overrides: PathOverrides,

        /// Symlink the library into the package instead of copying it
        #[arg(long)]
        in_place: bool,

        /// Write the build manifest as JSON to this path
        #[arg(long, value_name = "PATH")]
        manifest: Option<PathBuf>,
    },

    /// Print the toolchain commands a build would run
    Plan {
        #[command(flatten)]
        overrides: PathOverrides,
    },

    /// Save default configuration to the default location and exit
    SaveConfig,
}

#[derive(clap::Args, Debug)]
struct PathOverrides {
    /// libusb source directory
    #[arg(long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Directory the toolchain runs in
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Directory the library is staged into
    #[arg(long, value_name = "DIR")]
    package_dir: Option<PathBuf>,

    /// Target triple to build for (defaults to the host)
    #[arg(long, value_name = "TRIPLE")]
    target: Option<String>,
}

impl PathOverrides {
    fn apply(&self, config: &mut BuildConfig) {
        if let Some(dir) = &self.source_dir {
            config.paths.source_dir = dir.clone();
        }
        if let Some(dir) = &self.build_dir {
            config.paths.build_dir = dir.clone();
        }
        if let Some(dir) = &self.package_dir {
            config.paths.package_dir = dir.clone();
        }
        config.expand_paths();
    }

    fn platform(&self) -> Result<Platform> {
        match &self.target {
            Some(triple) => Platform::from_target_triple(triple)
                .with_context(|| format!("Unsupported target '{}'", triple)),
            None => Ok(Platform::host()),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if matches!(args.command, Command::SaveConfig) {
        let config = BuildConfig::default();
        let path = BuildConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        BuildConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        BuildConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.build.log_level.clone());
    setup_logging(&log_level).context("Failed to setup logging")?;

    info!("libusb-package-build v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Build {
            overrides,
            in_place,
            manifest,
        } => {
            overrides.apply(&mut config);
            if in_place {
                config.build.mode = StageMode::InPlace;
            }
            let platform = overrides.platform()?;
            let env = BuildEnv::from_env();
            if env.ci {
                info!("CI detected, build failures are fatal");
            }

            let orchestrator = Orchestrator::new(platform, config, env, SystemRunner)
                .context("Failed to resolve build paths")?;
            let result = orchestrator
                .run_tolerant()
                .context("Failed to build libusb")?;

            if result.is_empty() {
                println!("No library staged; the system libusb will be used at run time.");
            }
            for (name, path) in result.names.iter().zip(&result.paths) {
                println!("{} <- {}", name, path.display());
            }

            if let Some(path) = manifest {
                result
                    .write_json(&path)
                    .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
                info!("Wrote manifest to {}", path.display());
            }
        }
        Command::Plan { overrides } => {
            overrides.apply(&mut config);
            let platform = overrides.platform()?;
            let orchestrator =
                Orchestrator::new(platform, config, BuildEnv::from_env(), SystemRunner)
                    .context("Failed to resolve build paths")?;

            println!("# {}", orchestrator.platform());
            for step in orchestrator.steps() {
                println!("(cd {} && {})", step.cwd.display(), step);
            }
            println!(
                "# library: {}",
                builder::output_dir(orchestrator.platform(), orchestrator.config())
                    .join(orchestrator.platform().library_file_name())
                    .display()
            );
        }
        // Handled before configuration is loaded
        Command::SaveConfig => {}
    }

    Ok(())
}
