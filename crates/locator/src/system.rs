//! Operating system library search
//!
//! Used when the package bundles no libusb. Looks a candidate name up the
//! way the dynamic loader would: the loader's search path variable first,
//! then (on ELF systems) the loader cache as listed by `ldconfig -p`, then
//! the platform's standard library directories.

use common::{Os, Platform};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Where `ldconfig` is usually installed; `PATH` is tried last
const LDCONFIG_PROGRAMS: &[&str] = &["/sbin/ldconfig", "/usr/sbin/ldconfig", "ldconfig"];

/// Locate a shared library called `candidate` on the system
///
/// `candidate` is a bare name such as `usb-1.0`; `lib` prefixes and the
/// platform suffix are added as needed.
pub fn find_library(candidate: &str, platform: &Platform) -> Option<PathBuf> {
    let found = find_in_dirs(candidate, platform, &env_dirs(platform))
        .or_else(|| {
            uses_ld_cache(platform)
                .then(ldconfig_listing)
                .flatten()
                .and_then(|listing| find_in_ld_cache(&listing, candidate, platform))
        })
        .or_else(|| find_in_dirs(candidate, platform, &standard_dirs(platform)));

    match &found {
        Some(path) => debug!("System lookup for {} found {}", candidate, path.display()),
        None => debug!("System lookup for {} found nothing", candidate),
    }
    found
}

/// Search `dirs` in order for a library matching `candidate`
pub fn find_in_dirs(candidate: &str, platform: &Platform, dirs: &[PathBuf]) -> Option<PathBuf> {
    if candidate.is_empty() {
        return None;
    }
    let names = file_names(candidate, platform);

    dirs.iter().find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .or_else(|| versioned_match(dir, candidate, platform))
    })
}

/// Exact file names a loader would accept for `candidate`
fn file_names(candidate: &str, platform: &Platform) -> Vec<String> {
    let suffix = platform.shared_library_suffix();
    let mut names = Vec::new();
    match platform.os {
        Os::Windows => {
            names.push(format!("{}{}", candidate, suffix));
            names.push(format!("lib{}{}", candidate, suffix));
        }
        _ => {
            if !candidate.starts_with("lib") {
                names.push(format!("lib{}{}", candidate, suffix));
            }
            names.push(format!("{}{}", candidate, suffix));
        }
    }
    names
}

/// `lib<candidate>.so.N` style names, for systems without the dev symlink
fn versioned_match(dir: &Path, candidate: &str, platform: &Platform) -> Option<PathBuf> {
    if platform.os == Os::Windows || platform.os == Os::MacOs {
        return None;
    }
    let prefix = format!("{}.so.", lib_stem(candidate));

    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| {
                    name.strip_prefix(&prefix).is_some_and(is_version)
                })
        })
        .filter(|path| path.is_file())
        .collect();

    // Prefer the soname (fewest version components)
    matches.sort_by_key(|path| path.as_os_str().len());
    matches.into_iter().next()
}

fn is_version(s: &str) -> bool {
    !s.is_empty()
        && s.split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Directories named by the loader's search path variable
fn env_dirs(platform: &Platform) -> Vec<PathBuf> {
    let env_var = match platform.os {
        Os::Windows => "PATH",
        Os::MacOs => "DYLD_LIBRARY_PATH",
        _ => "LD_LIBRARY_PATH",
    };

    env::var_os(env_var)
        .map(|value| env::split_paths(&value).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect()
}

/// Standard library directories of the platform
fn standard_dirs(platform: &Platform) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match platform.os {
        Os::Windows => {
            if let Some(root) = env::var_os("SystemRoot") {
                dirs.push(PathBuf::from(root).join("System32"));
            }
        }
        Os::MacOs => {
            for dir in ["/usr/local/lib", "/opt/homebrew/lib", "/opt/local/lib", "/usr/lib"] {
                dirs.push(PathBuf::from(dir));
            }
        }
        _ => {
            let multiarch = format!("{}-linux-gnu", platform.arch);
            dirs.push(PathBuf::from("/usr/local/lib"));
            dirs.push(Path::new("/usr/lib").join(&multiarch));
            dirs.push(Path::new("/lib").join(&multiarch));
            for dir in ["/usr/lib64", "/lib64", "/usr/lib", "/lib"] {
                dirs.push(PathBuf::from(dir));
            }
        }
    }
    dirs
}

/// Whether the platform's loader keeps an `ld.so.cache`
fn uses_ld_cache(platform: &Platform) -> bool {
    platform.os == Os::Linux
}

/// Output of `ldconfig -p`, or `None` if no ldconfig could be run
fn ldconfig_listing() -> Option<String> {
    LDCONFIG_PROGRAMS.iter().find_map(|program| {
        match Command::new(program)
            .arg("-p")
            .env("LC_ALL", "C")
            .env("LANG", "C")
            .output()
        {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!("{} -p exited with {}", program, output.status);
                None
            }
            Err(e) => {
                debug!("Unable to run {}: {}", program, e);
                None
            }
        }
    })
}

/// Find `candidate` in an `ldconfig -p` listing
///
/// Entries look like
/// `libusb-1.0.so.0 (libc6,x86-64) => /lib/x86_64-linux-gnu/libusb-1.0.so.0`.
/// The first entry whose name is `lib<candidate>.so...`, whose ABI fits the
/// platform and whose target exists wins.
pub fn find_in_ld_cache(listing: &str, candidate: &str, platform: &Platform) -> Option<PathBuf> {
    if candidate.is_empty() {
        return None;
    }
    let prefix = format!("{}.so", lib_stem(candidate));

    listing.lines().find_map(|line| {
        let (entry, target) = line.split_once("=>")?;
        let entry = entry.trim();
        let (name, flags) = match entry.split_once(' ') {
            Some((name, flags)) => (name, flags.trim()),
            None => (entry, ""),
        };

        let path = PathBuf::from(target.trim());
        let named = name == prefix || name.starts_with(&format!("{}.", prefix));
        (named && abi_matches(flags, platform) && path.is_file()).then_some(path)
    })
}

/// Whether an ldconfig flags field such as `(libc6,x86-64)` fits `platform`
fn abi_matches(flags: &str, platform: &Platform) -> bool {
    match platform.arch.as_str() {
        "x86_64" => flags.contains("x86-64"),
        "aarch64" => flags.contains("AArch64"),
        _ if platform.pointer_width == 32 => !flags.contains("64"),
        _ => true,
    }
}

fn lib_stem(candidate: &str) -> String {
    if candidate.starts_with("lib") {
        candidate.to_string()
    } else {
        format!("lib{}", candidate)
    }
}
