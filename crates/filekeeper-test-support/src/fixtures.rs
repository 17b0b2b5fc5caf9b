//! Aged file trees and filesystem snapshots.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use filekeeper_config::RunParameters;
use tempfile::TempDir;

/// Age threshold used by the fixtures.
pub const THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Age given to files that should qualify.
pub const OLD: Duration = Duration::from_secs(48 * 60 * 60);

/// Temporary workspace holding a `target/` tree plus scratch space for destinations.
pub struct TargetTree {
    temp: TempDir,
    root: PathBuf,
}

impl TargetTree {
    /// Create an empty target tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("create temp dir")?;
        let root = temp.path().join("target");
        fs::create_dir_all(&root).context("create target root")?;
        Ok(Self { temp, root })
    }

    /// Root of the scanned tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `relative` inside the target tree.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// A path next to the target tree, not created.
    #[must_use]
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// A destination that can never be created (it sits below a regular file).
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking file cannot be written.
    pub fn blocked_destination(&self) -> Result<PathBuf> {
        let blocker = self.scratch("blocker");
        fs::write(&blocker, b"regular file").context("write blocker")?;
        Ok(blocker.join("backup"))
    }

    /// Write a file old enough to qualify.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or its mtime cannot be set.
    pub fn write_old(&self, relative: &str, body: &str) -> Result<PathBuf> {
        self.write_aged(relative, body, OLD)
    }

    /// Write a file too new to qualify.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_new(&self, relative: &str, body: &str) -> Result<PathBuf> {
        self.write_aged(relative, body, Duration::ZERO)
    }

    /// Write a file whose modification time lies `age` in the past.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or its mtime cannot be set.
    pub fn write_aged(&self, relative: &str, body: &str, age: Duration) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
        let modified = SystemTime::now()
            .checked_sub(age)
            .context("age before epoch")?;
        File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(modified))
            .with_context(|| format!("set mtime on {}", path.display()))?;
        Ok(path)
    }

    /// Backup parameters for this tree with the given local destinations.
    #[must_use]
    pub fn backup_parameters(&self, locals: Vec<PathBuf>) -> RunParameters {
        let mut params = RunParameters::prune_only(&self.root, THRESHOLD);
        params.backup_enabled = true;
        params.local_destinations = locals;
        params
    }
}

/// Every entry under `root` keyed by relative path; directories map to `None`.
///
/// # Errors
///
/// Returns an error if any entry cannot be read.
pub fn snapshot(root: &Path) -> Result<BTreeMap<PathBuf, Option<Vec<u8>>>> {
    let mut entries = BTreeMap::new();
    if root.exists() {
        collect(root, root, &mut entries)?;
    }
    Ok(entries)
}

fn collect(
    root: &Path,
    dir: &Path,
    entries: &mut BTreeMap<PathBuf, Option<Vec<u8>>>,
) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        let relative = path.strip_prefix(root)?.to_path_buf();
        if path.is_dir() {
            entries.insert(relative, None);
            collect(root, &path, entries)?;
        } else {
            let body = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            entries.insert(relative, Some(body));
        }
    }
    Ok(())
}
