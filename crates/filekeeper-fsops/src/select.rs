//! Target-tree walk and age classification.
//!
//! # Design
//! - The walk is a plain iterator of classified entries; callers own the
//!   cancellation checks and error policy.
//! - Directories are never yielded. A missing root surfaces as one inaccessible entry.
//! - A file qualifies only when its modification time is strictly before the cutoff.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use crate::error::{FsOpsError, FsOpsResult};
use crate::model::FileRecord;
use crate::result::{Operation, RunResult};

/// Compute the cutoff instant for files older than `age`, relative to `now`.
#[must_use]
pub fn cutoff_from(now: SystemTime, age: Duration) -> SystemTime {
    now.checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Classification of one non-directory entry under the root.
#[derive(Debug)]
pub enum Selection {
    /// The file is older than the cutoff.
    Qualifies(FileRecord),
    /// The file was modified at or after the cutoff.
    TooNew(PathBuf),
    /// The entry could not be inspected.
    Inaccessible {
        /// Entry that failed.
        path: PathBuf,
        /// Cause of the failure.
        error: FsOpsError,
    },
}

/// Iterator over the classified entries of a target tree.
pub struct Selector {
    root: PathBuf,
    cutoff: SystemTime,
    walker: walkdir::IntoIter,
}

impl Selector {
    /// Start walking `root`, classifying entries against `cutoff`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, cutoff: SystemTime) -> Self {
        let root = root.into();
        let walker = WalkDir::new(&root).into_iter();
        Self {
            root,
            cutoff,
            walker,
        }
    }

    /// Root being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn classify(&self, entry: &DirEntry) -> Selection {
        let path = entry.path().to_path_buf();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                return Selection::Inaccessible {
                    error: FsOpsError::walkdir("select.metadata", &path, err),
                    path,
                };
            }
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                return Selection::Inaccessible {
                    error: FsOpsError::io("select.modified", &path, err),
                    path,
                };
            }
        };
        if modified >= self.cutoff {
            return Selection::TooNew(path);
        }
        let Ok(relative) = path.strip_prefix(&self.root).map(Path::to_path_buf) else {
            return Selection::Inaccessible {
                error: FsOpsError::InvalidInput {
                    field: "path",
                    reason: "outside target root",
                    value: Some(path.display().to_string()),
                },
                path,
            };
        };
        Selection::Qualifies(FileRecord {
            source: path,
            relative,
            size: metadata.len(),
            modified,
        })
    }
}

impl Iterator for Selector {
    type Item = Selection;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => return Some(self.classify(&entry)),
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(Selection::Inaccessible {
                        error: FsOpsError::walkdir("select.walk", &path, err),
                        path,
                    });
                }
            }
        }
    }
}

/// Walk `root` and hand every qualifying file to `handler`.
///
/// Inaccessible entries are recorded as access failures and too-new files as
/// skips; neither stops the walk. Cancellation is checked before each entry.
///
/// # Errors
///
/// Returns [`FsOpsError::Cancelled`] once `cancel` fires.
pub fn select_files<F>(
    root: &Path,
    cutoff: SystemTime,
    cancel: &CancellationToken,
    result: &mut RunResult,
    mut handler: F,
) -> FsOpsResult<()>
where
    F: FnMut(FileRecord),
{
    let mut selector = Selector::new(root, cutoff);
    loop {
        if cancel.is_cancelled() {
            return Err(FsOpsError::Cancelled);
        }
        let Some(selection) = selector.next() else {
            return Ok(());
        };
        match selection {
            Selection::Qualifies(record) => handler(record),
            Selection::TooNew(_) => result.skipped += 1,
            Selection::Inaccessible { path, error } => record_access_failure(result, &path, &error),
        }
    }
}

pub(crate) fn record_access_failure(result: &mut RunResult, path: &Path, error: &FsOpsError) {
    tracing::warn!(
        path = %path.display(),
        operation = Operation::Access.as_str(),
        error = %error.describe(),
        "cannot access entry"
    );
    result.add_failure(path, Operation::Access, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fs::{self, File};
    use tempfile::TempDir;

    type TestResult<T> = Result<T, Box<dyn Error>>;

    fn write_aged(path: &Path, age: Duration) -> TestResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"payload")?;
        let modified = SystemTime::now() - age;
        File::options().write(true).open(path)?.set_modified(modified)?;
        Ok(())
    }

    #[test]
    fn cutoff_saturates_at_epoch() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        assert_eq!(
            cutoff_from(now, Duration::from_secs(20)),
            SystemTime::UNIX_EPOCH
        );
        assert_eq!(
            cutoff_from(now, Duration::from_secs(4)),
            SystemTime::UNIX_EPOCH + Duration::from_secs(6)
        );
    }

    #[test]
    fn selector_classifies_old_and_new_files() -> TestResult<()> {
        let temp = TempDir::new()?;
        let root = temp.path();
        write_aged(&root.join("old/a.log"), Duration::from_secs(7200))?;
        write_aged(&root.join("fresh.log"), Duration::ZERO)?;

        let cutoff = cutoff_from(SystemTime::now(), Duration::from_secs(3600));
        let mut qualifying = Vec::new();
        let mut too_new = Vec::new();
        for selection in Selector::new(root, cutoff) {
            match selection {
                Selection::Qualifies(record) => qualifying.push(record),
                Selection::TooNew(path) => too_new.push(path),
                Selection::Inaccessible { path, .. } => {
                    return Err(format!("unexpected access error at {}", path.display()).into());
                }
            }
        }

        assert_eq!(qualifying.len(), 1);
        assert_eq!(qualifying[0].relative, PathBuf::from("old/a.log"));
        assert_eq!(qualifying[0].size, 7);
        assert_eq!(too_new, vec![root.join("fresh.log")]);
        Ok(())
    }

    #[test]
    fn missing_root_is_reported_as_inaccessible() -> TestResult<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let mut result = RunResult::new();
        select_files(
            &missing,
            SystemTime::now(),
            &CancellationToken::new(),
            &mut result,
            |_| {},
        )?;
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].operation, Operation::Access);
        Ok(())
    }

    #[test]
    fn select_files_stops_when_cancelled() -> TestResult<()> {
        let temp = TempDir::new()?;
        write_aged(&temp.path().join("a.log"), Duration::from_secs(7200))?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut seen = 0;
        let mut result = RunResult::new();
        let outcome = select_files(temp.path(), SystemTime::now(), &cancel, &mut result, |_| {
            seen += 1;
        });
        assert!(matches!(outcome, Err(FsOpsError::Cancelled)));
        assert_eq!(seen, 0);
        assert_eq!(result, RunResult::new());
        Ok(())
    }

    #[test]
    fn select_files_counts_skips() -> TestResult<()> {
        let temp = TempDir::new()?;
        write_aged(&temp.path().join("a.log"), Duration::from_secs(7200))?;
        write_aged(&temp.path().join("b.log"), Duration::ZERO)?;
        let cutoff = cutoff_from(SystemTime::now(), Duration::from_secs(3600));

        let mut records = Vec::new();
        let mut result = RunResult::new();
        select_files(
            temp.path(),
            cutoff,
            &CancellationToken::new(),
            &mut result,
            |record| records.push(record),
        )?;
        assert_eq!(records.len(), 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 0);
        Ok(())
    }
}
