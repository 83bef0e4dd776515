//! Artifact staging into the package directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::StageMode;
use crate::error::{BuildError, Result};

/// A library placed into the package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    /// File name, as produced by the native build
    pub name: String,
    /// Build output the library came from
    pub source: PathBuf,
    /// Location inside the package directory
    pub destination: PathBuf,
    /// True if the destination is a symlink to `source`
    pub linked: bool,
}

/// Stage `artifact` into `package_dir` using the platform symlink call
pub fn stage(artifact: &Path, package_dir: &Path, mode: StageMode) -> Result<StagedArtifact> {
    stage_with(artifact, package_dir, mode, create_symlink)
}

/// Stage `artifact` into `package_dir`, creating links with `link`
///
/// Any existing file at the destination is replaced. In
/// [`StageMode::InPlace`] a failed `link` falls back to a copy; a failed copy
/// is always a [`BuildError::Staging`].
pub fn stage_with<F>(
    artifact: &Path,
    package_dir: &Path,
    mode: StageMode,
    link: F,
) -> Result<StagedArtifact>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let name = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BuildError::Staging {
            path: artifact.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"),
        })?
        .to_string();

    let source = std::path::absolute(artifact).map_err(|e| staging_error(artifact, e))?;
    let destination = package_dir.join(&name);

    fs::create_dir_all(package_dir).map_err(|e| staging_error(package_dir, e))?;
    remove_existing(&destination)?;

    let linked = match mode {
        StageMode::InPlace => {
            info!(
                "In place: linking {} to built {}",
                destination.display(),
                source.display()
            );
            match link(&source, &destination) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Failed to symlink {} ({}), copying instead",
                        destination.display(),
                        e
                    );
                    // A partial link must not block the copy
                    remove_existing(&destination)?;
                    copy(&source, &destination)?;
                    false
                }
            }
        }
        StageMode::Copy => {
            info!(
                "Copying built {} to {}",
                source.display(),
                destination.display()
            );
            copy(&source, &destination)?;
            false
        }
    };

    Ok(StagedArtifact {
        name,
        source,
        destination,
        linked,
    })
}

fn copy(source: &Path, destination: &Path) -> Result<()> {
    // fs::copy follows symlinks, so a linked build output is copied as data
    fs::copy(source, destination).map_err(|e| staging_error(destination, e))?;
    Ok(())
}

fn remove_existing(destination: &Path) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_dir() => Err(staging_error(
            destination,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination is a directory",
            ),
        )),
        Ok(_) => fs::remove_file(destination).map_err(|e| staging_error(destination, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(staging_error(destination, e)),
    }
}

fn staging_error(path: &Path, source: io::Error) -> BuildError {
    BuildError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, destination)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _destination: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}
