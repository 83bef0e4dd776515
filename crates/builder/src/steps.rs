//! External toolchain steps
//!
//! Turns a platform, a configuration and an environment snapshot into the
//! ordered list of processes to run. Planning is pure so that the command
//! lines for every platform can be checked on any host.

use common::{Os, Platform, ToolchainKind};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::env::BuildEnv;

/// Optimization and warning flags for the autotools build
pub const DEFAULT_CFLAGS: &[&str] = &[
    "-O2",
    "-Winline",
    "-Wmissing-include-dirs",
    "-Wnested-externs",
    "-Wpointer-arith",
    "-Wredundant-decls",
    "-Wswitch-enum",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Bootstrap,
    Configure,
    Make,
    MsBuild,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Bootstrap => "bootstrap",
            StepKind::Configure => "configure",
            StepKind::Make => "make",
            StepKind::MsBuild => "msbuild",
        };
        f.write_str(name)
    }
}

/// One external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub kind: StepKind,
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables for this process
    pub env: Vec<(String, String)>,
    /// Working directory
    pub cwd: PathBuf,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}=\"{}\" ", key, value)?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Plan the external invocations for one build
pub fn plan_steps(platform: &Platform, config: &BuildConfig, env: &BuildEnv) -> Vec<BuildStep> {
    match platform.toolchain {
        ToolchainKind::Autotools => plan_autotools(platform, config, env),
        ToolchainKind::MsBuild => vec![plan_msbuild(platform, config)],
    }
}

fn plan_autotools(platform: &Platform, config: &BuildConfig, env: &BuildEnv) -> Vec<BuildStep> {
    let cwd = config.paths.build_dir.clone();
    let bootstrap = script_path(&config.paths.source_dir.join("bootstrap.sh"), env);
    let configure = script_path(&config.paths.source_dir.join("configure"), env);
    let cflags = vec![("CFLAGS".to_string(), cflags(config, env))];

    let mut configure_args = vec![configure];
    configure_args.extend(configure_flags(platform, config, env));

    vec![
        BuildStep {
            kind: StepKind::Bootstrap,
            program: "bash".to_string(),
            args: vec![bootstrap],
            env: Vec::new(),
            cwd: cwd.clone(),
        },
        BuildStep {
            kind: StepKind::Configure,
            program: "bash".to_string(),
            args: configure_args,
            env: cflags.clone(),
            cwd: cwd.clone(),
        },
        BuildStep {
            kind: StepKind::Make,
            program: "make".to_string(),
            args: vec![format!("-j{}", config.jobs_or(env.jobs))],
            env: cflags,
            cwd,
        },
    ]
}

fn plan_msbuild(platform: &Platform, config: &BuildConfig) -> BuildStep {
    let solution = config.paths.source_dir.join(&config.windows.solution);
    BuildStep {
        kind: StepKind::MsBuild,
        program: "msbuild".to_string(),
        args: vec![
            solution.display().to_string(),
            format!("/p:Configuration={}", config.windows.configuration),
            format!("/p:Platform={}", platform.msbuild_platform()),
            "/m".to_string(),
        ],
        env: Vec::new(),
        cwd: config.paths.build_dir.clone(),
    }
}

/// Arguments appended to the configure script
pub fn configure_flags(platform: &Platform, config: &BuildConfig, env: &BuildEnv) -> Vec<String> {
    let mut flags = Vec::new();

    // udev headers are not available on build hosts
    if platform.os == Os::Linux {
        flags.push("--disable-udev".to_string());
    }

    if let Some(arch) = env.requested_arch() {
        flags.push(format!("--host={}", host_triple(arch, &platform.os)));
    }

    flags.extend(config.build.extra_configure_args.iter().cloned());
    flags
}

/// CFLAGS value for configure and make
pub fn cflags(config: &BuildConfig, env: &BuildEnv) -> String {
    let mut flags: Vec<&str> = DEFAULT_CFLAGS.to_vec();
    flags.extend(config.build.extra_cflags.iter().map(String::as_str));
    if let Some(arch_flags) = env.arch_flags.as_deref() {
        flags.push(arch_flags);
    }
    flags.join(" ")
}

/// GNU host triple for cross-compiling to `arch` on `os`
pub fn host_triple(arch: &str, os: &Os) -> String {
    let arch = match arch {
        "arm64" | "aarch64" => "aarch64",
        "x86_64" | "amd64" => "x86_64",
        "i386" | "i686" | "x86" => "i686",
        other => other,
    };
    match os {
        Os::MacOs => format!("{}-apple-darwin", arch),
        Os::Linux => format!("{}-linux-gnu", arch),
        Os::Windows => format!("{}-w64-mingw32", arch),
        Os::Other(name) => format!("{}-unknown-{}", arch, name),
    }
}

/// Directory the toolchain leaves the shared library in
pub fn output_dir(platform: &Platform, config: &BuildConfig) -> PathBuf {
    if let Some(dir) = &config.paths.output_dir {
        return dir.clone();
    }
    match platform.toolchain {
        ToolchainKind::Autotools => config.paths.build_dir.join("libusb").join(".libs"),
        ToolchainKind::MsBuild => config
            .paths
            .source_dir
            .join(platform.msbuild_platform())
            .join(&config.windows.configuration)
            .join("dll"),
    }
}

fn script_path(path: &Path, env: &BuildEnv) -> String {
    let path = path.display().to_string();
    if env.msys { to_posix_path(&path) } else { path }
}

/// Rewrite a Windows path for an MSYS shell (`C:\a\b` becomes `/c/a/b`)
pub fn to_posix_path(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let bytes = slashed.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        format!("/{}{}", drive, &slashed[2..])
    } else {
        slashed
    }
}
