//! Integration tests for build configuration parsing
//!
//! Run with: `cargo test -p builder --test config_tests`

use builder::{BuildConfig, StageMode};
use std::path::PathBuf;
use tempfile::tempdir;

const MINIMAL_CONFIG: &str = r#"
[build]
log_level = "info"

[paths]
source_dir = "vendor/libusb"
build_dir = "target/libusb-build"
package_dir = "target/pkg"
"#;

const FULL_CONFIG: &str = r#"
[build]
log_level = "debug"
mode = "in-place"
jobs = 2
extra_cflags = ["-g"]
extra_configure_args = ["--enable-debug-log"]

[paths]
source_dir = "/src/libusb"
build_dir = "/tmp/libusb-build"
package_dir = "/opt/pkg"
output_dir = "/tmp/libusb-build/out"

[windows]
configuration = "Debug"
solution = "msvc/libusb_2019.sln"
"#;

#[test]
fn test_parse_minimal_config() {
    let config = BuildConfig::from_toml(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.build.log_level, "info");
    assert_eq!(config.build.mode, StageMode::Copy);
    assert_eq!(config.build.jobs, None);
    assert_eq!(config.paths.source_dir, PathBuf::from("vendor/libusb"));
    assert_eq!(config.paths.output_dir, None);
    assert_eq!(config.windows.configuration, "Release");
}

#[test]
fn test_parse_full_config() {
    let config = BuildConfig::from_toml(FULL_CONFIG).unwrap();

    assert_eq!(config.build.mode, StageMode::InPlace);
    assert_eq!(config.build.jobs, Some(2));
    assert_eq!(config.build.extra_cflags, vec!["-g".to_string()]);
    assert_eq!(
        config.paths.output_dir,
        Some(PathBuf::from("/tmp/libusb-build/out"))
    );
    assert_eq!(config.windows.configuration, "Debug");
    assert_eq!(config.windows.solution, PathBuf::from("msvc/libusb_2019.sln"));
}

#[test]
fn test_invalid_configs_rejected() {
    let bad_level = MINIMAL_CONFIG.replace("\"info\"", "\"loud\"");
    assert!(BuildConfig::from_toml(&bad_level).is_err());

    let bad_mode = FULL_CONFIG.replace("\"in-place\"", "\"teleport\"");
    assert!(BuildConfig::from_toml(&bad_mode).is_err());

    let zero_jobs = FULL_CONFIG.replace("jobs = 2", "jobs = 0");
    assert!(BuildConfig::from_toml(&zero_jobs).is_err());

    let missing_paths = "[build]\nlog_level = \"info\"\n";
    assert!(BuildConfig::from_toml(missing_paths).is_err());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("build.toml");

    let mut config = BuildConfig::default();
    config.build.mode = StageMode::InPlace;
    config.build.extra_configure_args = vec!["--disable-log".to_string()];
    config.save(&path).unwrap();

    let loaded = BuildConfig::load(Some(path)).unwrap();
    assert_eq!(loaded.build.mode, StageMode::InPlace);
    assert_eq!(
        loaded.build.extra_configure_args,
        vec!["--disable-log".to_string()]
    );
    assert_eq!(loaded.paths.package_dir, config.paths.package_dir);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempdir().unwrap();
    assert!(BuildConfig::load(Some(dir.path().join("absent.toml"))).is_err());
}
