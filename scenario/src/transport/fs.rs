//! Temporary filesystems backing container and storage mocks.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use scenario_state::{Container, Storage};
use tempfile::TempDir;

use crate::error::ModelError;

/// A lazily created temporary directory holding one subtree per container
/// and per storage instance. Removed when dropped.
#[derive(Debug, Default)]
pub struct FsArena {
    base: RefCell<Option<TempDir>>,
}

impl FsArena {
    fn base(&self) -> io::Result<PathBuf> {
        let mut base = self.base.borrow_mut();
        if let Some(dir) = base.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new().prefix("scenario-fs-").tempdir()?;
        let path = dir.path().to_path_buf();
        *base = Some(dir);
        Ok(path)
    }

    /// Root of the filesystem seen inside container `name`, created on demand.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn container_root(&self, name: &str) -> io::Result<PathBuf> {
        let root = self.base()?.join("containers").join(name);
        fs::create_dir_all(&root)?;
        Ok(root)
    }

    /// Location of a storage instance, created on demand.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn storage_root(&self, storage: &Storage) -> io::Result<PathBuf> {
        let root = self
            .base()?
            .join("storages")
            .join(&storage.name)
            .join(storage.index.to_string());
        fs::create_dir_all(&root)?;
        Ok(root)
    }
}

/// Maps an absolute path inside `container` to the host path backing it.
///
/// Mount locations take precedence over the container root; the longest
/// matching location wins.
pub(crate) fn resolve(container: &Container, root: &Path, path: &str) -> Result<PathBuf, ModelError> {
    let requested = Path::new(path);
    if !requested.is_absolute() {
        return Err(ModelError::invalid(format!("{path}: paths must be absolute")));
    }
    if requested.components().any(|c| c == Component::ParentDir) {
        return Err(ModelError::invalid(format!("{path}: paths may not contain '..'")));
    }

    let mount = container
        .mounts
        .values()
        .filter_map(|m| {
            requested
                .strip_prefix(&m.location)
                .ok()
                .map(|rest| (m.location.len(), m.source.join(rest)))
        })
        .max_by_key(|(len, _)| *len);
    if let Some((_, host)) = mount {
        return Ok(host);
    }

    let relative: PathBuf = requested
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    Ok(root.join(relative))
}
