//! Sandboxed workspace store.
//!
//! A [`Store`] is a handle on one workspace root. Every path handed to it is
//! resolved against that root and must stay inside it after symlinks and
//! `..` segments are resolved; anything else is a
//! [`WardenError::SandboxViolation`]. The check runs on every entry point.

use crate::core::error::WardenError;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Dangling links followed before resolution gives up (the kernel's ELOOP bound).
const MAX_SYMLINK_HOPS: usize = 40;

/// Store handle representing a sandboxed workspace.
#[derive(Debug, Clone)]
pub struct Store {
    /// Canonical path of the workspace root
    root: PathBuf,
}

impl Store {
    /// Open (creating if needed) the workspace at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WardenError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` to a canonical path inside the workspace.
    ///
    /// Existing prefixes are canonicalized (following symlinks); the
    /// not-yet-existing tail is applied lexically on top of them. A dangling
    /// symlink is followed through its link text, since writing through it
    /// would create the target.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, WardenError> {
        let resolved = resolve_components(&self.root.join(relative), MAX_SYMLINK_HOPS);
        match resolved {
            Some(resolved) if resolved.starts_with(&self.root) => Ok(resolved),
            _ => {
                tracing::warn!(path = relative, "sandbox violation");
                Err(WardenError::SandboxViolation(relative.to_string()))
            }
        }
    }

    /// Workspace-relative display form of a resolved path.
    pub fn relative_display(&self, resolved: &Path) -> String {
        resolved
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| resolved.to_string_lossy().to_string())
    }

    pub fn file_exists(&self, relative: &str) -> Result<bool, WardenError> {
        Ok(self.resolve(relative)?.is_file())
    }

    pub fn dir_exists(&self, relative: &str) -> Result<bool, WardenError> {
        Ok(self.resolve(relative)?.is_dir())
    }

    /// Size in bytes of an existing file, `None` when absent.
    pub fn file_size(&self, relative: &str) -> Result<Option<u64>, WardenError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::metadata(path)?.len()))
    }

    pub fn read_file(&self, relative: &str) -> Result<String, WardenError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(WardenError::NotFound(relative.to_string()));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Write (or overwrite) a file, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<(), WardenError> {
        let path = self.resolve(relative)?;
        if path == self.root || path.is_dir() {
            return Err(WardenError::ValidationError(format!(
                "{} is a directory",
                relative
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Like [`Store::write_file`] but refuses to touch an existing target.
    pub fn create_file(&self, relative: &str, content: &str) -> Result<(), WardenError> {
        let path = self.resolve(relative)?;
        if path.exists() {
            return Err(WardenError::AlreadyExists(relative.to_string()));
        }
        self.write_file(relative, content)
    }

    /// Remove a file, or a directory recursively. Absent targets are reported.
    pub fn delete(&self, relative: &str) -> Result<(), WardenError> {
        let path = self.resolve(relative)?;
        if path == self.root {
            return Err(WardenError::ValidationError(
                "refusing to delete the workspace root".to_string(),
            ));
        }
        if path.is_file() {
            fs::remove_file(path)?;
        } else if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            return Err(WardenError::NotFound(relative.to_string()));
        }
        Ok(())
    }

    /// Workspace-relative paths of the entries directly under `relative`.
    /// An absent directory lists as empty.
    pub fn list(&self, relative: &str) -> Result<Vec<String>, WardenError> {
        let path = self.resolve(relative)?;
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            entries.push(self.relative_display(&path.join(entry.file_name())));
        }
        entries.sort();
        Ok(entries)
    }
}

/// Walk `path` component by component. `None` when a chain of dangling links
/// is too long or a link cannot be read.
fn resolve_components(path: &Path, hops: usize) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                if let Ok(canonical) = fs::canonicalize(&resolved) {
                    resolved = canonical;
                    continue;
                }
                let is_link = fs::symlink_metadata(&resolved)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_link {
                    let target = fs::read_link(&resolved).ok()?;
                    let base = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
                    resolved = resolve_components(&base.join(target), hops.checked_sub(1)?)?;
                }
                // Missing components stay lexical; nothing below them can be a symlink.
            }
        }
    }
    Some(resolved)
}
