//! Storage operations
//!
//! Filesystem mutations behind MKD, RMD, DELE, SIZE, RNFR/RNTO and STOR.
//! Every path argument goes through the [`Sandbox`] first.

use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::sandbox::Sandbox;

/// Creates a directory (and missing parents). Returns the created path.
pub fn make_directory(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<PathBuf, StorageError> {
    let path = sandbox.resolve(cwd, arg)?;

    if path.exists() {
        return Err(StorageError::AlreadyExists);
    }

    fs::create_dir_all(&path).map_err(|e| {
        error!("Failed to create directory {}: {}", path.display(), e);
        StorageError::from(e)
    })?;

    info!("Directory created: {}", path.display());
    Ok(path)
}

/// Removes an empty directory. The sandbox root itself is never removed,
/// and a symlink is never treated as a directory.
pub fn remove_directory(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<(), StorageError> {
    let path = sandbox.resolve_entry(cwd, arg)?;

    if path == sandbox.root() {
        return Err(StorageError::OutsideRoot);
    }
    let metadata = fs::symlink_metadata(&path).map_err(|_| StorageError::NotFound)?;
    if !metadata.is_dir() {
        return Err(StorageError::NotADirectory);
    }
    if fs::read_dir(&path)?.next().is_some() {
        return Err(StorageError::NotEmpty);
    }

    fs::remove_dir(&path).map_err(|e| {
        error!("Failed to remove directory {}: {}", path.display(), e);
        StorageError::from(e)
    })?;

    info!("Directory removed: {}", path.display());
    Ok(())
}

/// Deletes a regular file or a symlink (not its target); directories must
/// go through RMD.
pub fn delete_file(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<(), StorageError> {
    let path = sandbox.resolve_entry(cwd, arg)?;

    let metadata = fs::symlink_metadata(&path).map_err(|_| StorageError::NotFound)?;
    if metadata.is_dir() {
        return Err(StorageError::IsADirectory);
    }

    fs::remove_file(&path).map_err(|e| {
        error!("Failed to delete file {}: {}", path.display(), e);
        StorageError::from(e)
    })?;

    info!("File deleted: {}", path.display());
    Ok(())
}

/// Size in bytes of an existing regular file.
pub fn file_size(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<u64, StorageError> {
    let path = sandbox.resolve(cwd, arg)?;

    match fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(StorageError::IsADirectory),
        Err(_) => Err(StorageError::NotFound),
    }
}

/// Validates the RNFR source and returns the entry to move.
pub fn rename_source(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<PathBuf, StorageError> {
    let path = sandbox.resolve_entry(cwd, arg)?;

    if path == sandbox.root() {
        return Err(StorageError::OutsideRoot);
    }
    if fs::symlink_metadata(&path).is_err() {
        return Err(StorageError::NotFound);
    }
    Ok(path)
}

/// Moves `source` to the RNTO target, creating the target's parents.
pub fn rename(
    sandbox: &Sandbox,
    cwd: &Path,
    source: &Path,
    arg: &str,
) -> Result<PathBuf, StorageError> {
    let target = sandbox.resolve_entry(cwd, arg)?;

    if fs::symlink_metadata(&target).is_ok() {
        return Err(StorageError::AlreadyExists);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(source, &target).map_err(|e| {
        error!(
            "Failed to rename {} -> {}: {}",
            source.display(),
            target.display(),
            e
        );
        StorageError::from(e)
    })?;

    info!("Renamed {} -> {}", source.display(), target.display());
    Ok(target)
}

/// Resolves a STOR target and creates its parent directories.
pub fn prepare_upload(sandbox: &Sandbox, cwd: &Path, arg: &str) -> Result<PathBuf, StorageError> {
    let path = sandbox.resolve(cwd, arg)?;

    if path == sandbox.root() || path.is_dir() {
        return Err(StorageError::IsADirectory);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(path)
}
