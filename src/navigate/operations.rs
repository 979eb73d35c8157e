//! Navigation operations implementation

use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::Sandbox;

/// Resolves a CWD target. The result is canonical, root-contained and an
/// existing directory.
pub fn change_directory(
    sandbox: &Sandbox,
    current: &Path,
    target_path: &str,
) -> Result<PathBuf, StorageError> {
    let new_path = sandbox.resolve(current, target_path)?;

    if !new_path.exists() {
        return Err(StorageError::NotFound);
    }

    if !new_path.is_dir() {
        return Err(StorageError::NotADirectory);
    }

    Ok(new_path)
}

/// Client-visible form of the working directory, e.g. `/sub`.
pub fn working_directory(sandbox: &Sandbox, current: &Path) -> String {
    sandbox.virtual_path(current)
}
