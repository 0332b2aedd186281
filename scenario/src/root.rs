//! The virtual charm root: the directory a charm sees as its own.
//!
//! It holds `metadata.yaml`, `config.yaml` and `actions.yaml` written from
//! the run's [`CharmSpec`], plus the charm's `src/` and `lib/` when the metadata
//! was loaded from a directory. A root the engine allocates is deleted on
//! drop. A caller-supplied root is left as it was found: files the engine
//! overwrote are restored and files it added are removed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scenario_state::CharmSpec;
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

const LIBRARY_DIRS: [&str; 2] = ["src", "lib"];

/// A prepared charm root, cleaned up on drop.
#[derive(Debug)]
pub struct VirtualCharmRoot {
    path: PathBuf,
    owned: Option<TempDir>,
    created: Vec<PathBuf>,
    backups: Vec<(PathBuf, Vec<u8>)>,
}

impl VirtualCharmRoot {
    /// Lays out `spec` in `root`, or in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor cannot be serialized or any file
    /// cannot be written, linked or copied.
    pub fn build(spec: &CharmSpec, root: Option<&Path>) -> Result<Self> {
        let mut vroot = match root {
            Some(path) => Self {
                path: path.to_path_buf(),
                owned: None,
                created: Vec::new(),
                backups: Vec::new(),
            },
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("scenario-charm-")
                    .tempdir()
                    .context("Failed to create a temporary charm root")?;
                Self {
                    path: dir.path().to_path_buf(),
                    owned: Some(dir),
                    created: Vec::new(),
                    backups: Vec::new(),
                }
            }
        };
        fs::create_dir_all(&vroot.path)
            .with_context(|| format!("Failed to create charm root: {}", vroot.path.display()))?;

        vroot.write("metadata.yaml", &spec.meta_yaml()?)?;
        if let Some(config) = spec.config_yaml()? {
            vroot.write("config.yaml", &config)?;
        }
        if let Some(actions) = spec.actions_yaml()? {
            vroot.write("actions.yaml", &actions)?;
        }
        if let Some(source) = &spec.source {
            vroot.link_libraries(source)?;
        }
        debug!(root = %vroot.path.display(), owned = vroot.owned.is_some(), "charm root ready");
        Ok(vroot)
    }

    /// The root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps everything written so far and returns the root directory.
    /// Nothing is restored or removed afterwards.
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        self.backups.clear();
        self.created.clear();
        if let Some(dir) = self.owned.take() {
            return dir.into_path();
        }
        self.path.clone()
    }

    fn write(&mut self, name: &str, content: &str) -> Result<()> {
        let path = self.path.join(name);
        if self.owned.is_none() {
            if path.is_file() {
                let original = fs::read(&path)
                    .with_context(|| format!("Failed to back up {}", path.display()))?;
                self.backups.push((path.clone(), original));
            } else {
                self.created.push(path.clone());
            }
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn link_libraries(&mut self, source: &Path) -> Result<()> {
        let same_dir = fs::canonicalize(source).ok() == fs::canonicalize(&self.path).ok();
        if same_dir {
            return Ok(());
        }
        for dir in LIBRARY_DIRS {
            let from = source.join(dir);
            let to = self.path.join(dir);
            if !from.is_dir() || to.exists() {
                continue;
            }
            link_or_copy(&from, &to)?;
            if self.owned.is_none() {
                self.created.push(to);
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn link_or_copy(from: &Path, to: &Path) -> Result<()> {
    std::os::unix::fs::symlink(from, to)
        .with_context(|| format!("Failed to link {} to {}", to.display(), from.display()))
}

#[cfg(not(unix))]
fn link_or_copy(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.with_context(|| format!("Failed to walk {}", from.display()))?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn remove(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

impl Drop for VirtualCharmRoot {
    fn drop(&mut self) {
        for (path, original) in self.backups.drain(..) {
            if let Err(err) = fs::write(&path, original) {
                warn!(path = %path.display(), %err, "cannot restore charm file");
            }
        }
        for path in self.created.drain(..).rev() {
            if let Err(err) = remove(&path) {
                warn!(path = %path.display(), %err, "cannot remove charm file");
            }
        }
    }
}

/// Files under `root`, relative to it, in walk order. Used to report what a
/// materialized root contains.
#[must_use]
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}
