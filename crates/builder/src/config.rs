//! Build configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How the built library is placed into the package directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageMode {
    /// Copy the library, replacing whatever is there
    #[default]
    Copy,
    /// Symlink to the build output for in-place development, copying if the
    /// link cannot be created
    InPlace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub build: BuildSettings,
    pub paths: PathSettings,
    /// Project-file build settings (MSVC targets only)
    #[serde(default)]
    pub windows: WindowsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    pub log_level: String,
    #[serde(default)]
    pub mode: StageMode,
    /// Parallel make jobs (defaults to the processor count)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Appended to the default CFLAGS
    #[serde(default)]
    pub extra_cflags: Vec<String>,
    /// Appended to the configure command line
    #[serde(default)]
    pub extra_configure_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// libusb source checkout (contains bootstrap.sh)
    pub source_dir: PathBuf,
    /// Scratch directory the toolchain runs in
    pub build_dir: PathBuf,
    /// Package directory the library is staged into
    pub package_dir: PathBuf,
    /// Where to look for the built library, overriding the toolchain default
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsSettings {
    #[serde(default = "WindowsSettings::default_configuration")]
    pub configuration: String,
    /// Solution file, relative to the source directory
    #[serde(default = "WindowsSettings::default_solution")]
    pub solution: PathBuf,
}

impl Default for WindowsSettings {
    fn default() -> Self {
        Self {
            configuration: Self::default_configuration(),
            solution: Self::default_solution(),
        }
    }
}

impl WindowsSettings {
    fn default_configuration() -> String {
        "Release".to_string()
    }

    fn default_solution() -> PathBuf {
        PathBuf::from("msvc").join("libusb.sln")
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build: BuildSettings {
                log_level: "info".to_string(),
                mode: StageMode::Copy,
                jobs: None,
                extra_cflags: Vec::new(),
                extra_configure_args: Vec::new(),
            },
            paths: PathSettings {
                source_dir: PathBuf::from("libusb"),
                build_dir: PathBuf::from("target").join("libusb-build"),
                package_dir: PathBuf::from("target").join("libusb-package"),
                output_dir: None,
            },
            windows: WindowsSettings::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("libusb-package.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse, expand and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: BuildConfig = toml::from_str(content)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("libusb-package").join("build.toml")
        } else {
            PathBuf::from(".config/libusb-package/build.toml")
        }
    }

    /// Make jobs for this build, given the processor count
    pub fn jobs_or(&self, available: usize) -> usize {
        self.build.jobs.unwrap_or(available).max(1)
    }

    /// Expand `~` in every configured path
    pub fn expand_paths(&mut self) {
        self.paths.source_dir = expand(&self.paths.source_dir);
        self.paths.build_dir = expand(&self.paths.build_dir);
        self.paths.package_dir = expand(&self.paths.package_dir);
        if let Some(dir) = self.paths.output_dir.take() {
            self.paths.output_dir = Some(expand(&dir));
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.build.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.build.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.build.jobs == Some(0) {
            return Err(anyhow!("jobs must be greater than 0"));
        }

        if self.windows.configuration.trim().is_empty() {
            return Err(anyhow!("windows.configuration must not be empty"));
        }

        for (name, path) in [
            ("source_dir", &self.paths.source_dir),
            ("build_dir", &self.paths.build_dir),
            ("package_dir", &self.paths.package_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("paths.{} must not be empty", name));
            }
        }

        Ok(())
    }
}

fn expand(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.build.log_level, "info");
        assert_eq!(config.build.mode, StageMode::Copy);
        assert_eq!(config.windows.configuration, "Release");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = BuildConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BuildConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.build.log_level, parsed.build.log_level);
        assert_eq!(config.paths.source_dir, parsed.paths.source_dir);
        assert_eq!(config.build.mode, parsed.build.mode);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = BuildConfig::default();
        config.build.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.build.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_jobs() {
        let mut config = BuildConfig::default();
        config.build.jobs = Some(0);
        assert!(config.validate().is_err());

        config.build.jobs = Some(2);
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs_or(16), 2);

        config.build.jobs = None;
        assert_eq!(config.jobs_or(16), 16);
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = BuildConfig::default();
        config.paths.package_dir = PathBuf::from("~/pkg");
        config.expand_paths();

        if dirs::home_dir().is_some() {
            assert!(!config.paths.package_dir.starts_with("~"));
            assert!(config.paths.package_dir.ends_with("pkg"));
        }
    }
}
