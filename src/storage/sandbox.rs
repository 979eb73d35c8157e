//! Path sandbox
//!
//! Resolves FTP path arguments against the session's working directory or
//! the sandbox root and rejects anything that lands outside the root.

use log::warn;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Canonical sandbox root shared by all sessions.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Canonicalizes `root`, which must be an existing directory.
    pub fn new(root: &Path) -> io::Result<Self> {
        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                "sandbox root is not a directory",
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `arg` to a canonical path inside the sandbox.
    ///
    /// A leading `/` anchors at the root, anything else at `cwd`. The target
    /// does not need to exist.
    pub fn resolve(&self, cwd: &Path, arg: &str) -> Result<PathBuf, StorageError> {
        let resolved = canonicalize_lenient(&self.join(cwd, arg))?;
        self.ensure_contained(resolved, arg)
    }

    /// Resolves `arg` to the directory entry it names, without following a
    /// symlink in the last segment.
    ///
    /// The fully resolved target must still lie inside the sandbox. Use this
    /// for operations that act on the entry itself (delete, remove, rename).
    pub fn resolve_entry(&self, cwd: &Path, arg: &str) -> Result<PathBuf, StorageError> {
        let target = self.resolve(cwd, arg)?;
        let joined = self.join(cwd, arg);

        let entry = match (joined.components().next_back(), joined.parent()) {
            (Some(Component::Normal(name)), Some(parent)) => {
                canonicalize_lenient(parent)?.join(name)
            }
            _ => target,
        };
        self.ensure_contained(entry, arg)
    }

    fn join(&self, cwd: &Path, arg: &str) -> PathBuf {
        match arg.strip_prefix('/') {
            Some(rest) => self.root.join(rest.trim_start_matches('/')),
            None => cwd.join(arg),
        }
    }

    fn ensure_contained(&self, path: PathBuf, arg: &str) -> Result<PathBuf, StorageError> {
        if self.contains(&path) {
            Ok(path)
        } else {
            warn!("Rejected path outside sandbox root: {arg}");
            Err(StorageError::OutsideRoot)
        }
    }

    /// Component-wise containment, so `/a/bb` is never inside `/a/b`.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Renders a contained path as seen by the client, always `/`-separated.
    pub fn virtual_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("/{}", parts.join("/"))
            }
            Err(_) => "/".to_string(),
        }
    }
}

/// Canonicalizes a path whose trailing segments may not exist yet.
///
/// Existing prefixes are resolved through the filesystem (following
/// symlinks); the missing tail is normalized lexically.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if fs::symlink_metadata(&resolved).is_ok() {
                    resolved = fs::canonicalize(&resolved)?;
                }
            }
        }
    }

    Ok(resolved)
}
