//! Atomic whole-file writes.
//!
//! Creates parent directories as needed and writes through a temporary file
//! in the target directory that is then renamed over the destination, so a
//! reader never observes a half-written file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{AppError, Result};

/// Summary of a completed file write operation.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Path of the written file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes_written: usize,
    /// Whether the file existed before the write.
    pub replaced_existing: bool,
}

/// Write `content` to `path`, replacing any existing file.
///
/// An existing file keeps its permissions. New files get the usual `0o644`
/// on Unix instead of the temp file's private mode.
///
/// # Errors
///
/// Returns `AppError::NotAFile` if `path` is a directory, or `AppError::Io`
/// on directory creation, temp file write, or rename failures.
pub fn write_file(path: &Path, content: &str) -> Result<WriteSummary> {
    if path.is_dir() {
        return Err(AppError::NotAFile(format!(
            "the path {} is a directory; provide a file path",
            path.display()
        )));
    }

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            AppError::Io(format!("file path {} has no parent directory", path.display()))
        })?;

    fs::create_dir_all(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create parent directories for {}: {err}",
            path.display()
        ))
    })?;

    let existing_permissions = fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create temporary file next to {}: {err}",
            path.display()
        ))
    })?;

    let bytes = content.as_bytes();
    tmp.write_all(bytes).map_err(|err| {
        AppError::Io(format!(
            "failed to write temporary file for {}: {err}",
            path.display()
        ))
    })?;

    let applied = match &existing_permissions {
        Some(permissions) => tmp.as_file().set_permissions(permissions.clone()),
        None => set_new_file_permissions(tmp.as_file()),
    };
    applied.map_err(|err| {
        AppError::Io(format!(
            "failed to set permissions for {}: {err}",
            path.display()
        ))
    })?;

    tmp.persist(path).map_err(|err| {
        AppError::Io(format!("failed to persist file to {}: {err}", path.display()))
    })?;

    Ok(WriteSummary {
        path: path.to_path_buf(),
        bytes_written: bytes.len(),
        replaced_existing: existing_permissions.is_some(),
    })
}

#[cfg(unix)]
fn set_new_file_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_new_file_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}
