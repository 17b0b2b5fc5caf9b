//! Per-cycle accounting.
//!
//! # Design
//! - One `RunResult` is owned by one cycle; sub-results are folded in with `merge`.
//! - `failed` counts files whose operation failed; `errors` also keeps recovered
//!   per-destination failures so nothing is silently dropped.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::FsOpsError;

/// Operation that produced a recorded error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Stat/read of a source entry.
    Access,
    /// Replication of one file to one local destination.
    Backup,
    /// Push of an artifact to one remote destination.
    Remote,
    /// Construction of an archive at one destination.
    Archive,
    /// Deletion of a source file.
    Prune,
}

impl Operation {
    /// Stable label used in logs and summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Backup => "backup",
            Self::Remote => "remote",
            Self::Archive => "archive",
            Self::Prune => "prune",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tied to a specific path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Path the operation was acting on.
    pub path: PathBuf,
    /// Operation that failed.
    pub operation: Operation,
    /// Rendered cause chain.
    pub cause: String,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {}: {}",
            self.operation,
            self.path.display(),
            self.cause
        )
    }
}

/// Outcome of one backup/prune cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    /// Files fully processed by the backup phase.
    pub succeeded: usize,
    /// Files whose access, backup or deletion failed.
    pub failed: usize,
    /// Files left alone because they are too new (or were retained).
    pub skipped: usize,
    /// Files replicated to at least one destination.
    pub backed_up: usize,
    /// Files deleted from the target tree.
    pub pruned: usize,
    /// Successful remote pushes.
    pub remote_copied: usize,
    /// Bytes of source data handled by the backup phase.
    pub total_bytes: u64,
    /// Source bytes before compression or archiving.
    pub original_bytes: u64,
    /// Bytes written after compression or archiving.
    pub compressed_bytes: u64,
    /// Errors in the order they occurred.
    pub errors: Vec<FileError>,
    /// Archive produced by archive mode, if any.
    pub archive_path: Option<PathBuf>,
    /// Size of `archive_path` in bytes.
    pub archive_size: u64,
}

impl RunResult {
    /// Create a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed file: the error is kept and `failed` increases.
    pub fn add_failure(&mut self, path: &Path, operation: Operation, error: &FsOpsError) {
        self.record_error(path, operation, error);
        self.failed += 1;
    }

    /// Record a recovered error that does not fail the file as a whole.
    pub fn record_error(&mut self, path: &Path, operation: Operation, error: &FsOpsError) {
        self.errors.push(FileError {
            path: path.to_path_buf(),
            operation,
            cause: error.describe(),
        });
    }

    /// Record a successfully processed file of `bytes` bytes.
    pub const fn add_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.total_bytes += bytes;
    }

    /// Whether any file failed.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.failed > 0
    }

    /// Percentage of attempted files that failed; `0` when nothing was attempted.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed, self.succeeded + self.failed)
    }

    /// Compressed size as a percentage of the original size; `100` when nothing was compressed.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        ratio_percent(self.original_bytes, self.compressed_bytes)
    }

    /// Percentage of the original size saved by compression.
    #[must_use]
    pub fn space_saved(&self) -> f64 {
        100.0 - self.compression_ratio()
    }

    /// Fold another result into this one.
    ///
    /// Counts and byte totals are summed, errors are appended, and the first
    /// non-empty archive path wins.
    pub fn merge(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.backed_up += other.backed_up;
        self.pruned += other.pruned;
        self.remote_copied += other.remote_copied;
        self.total_bytes += other.total_bytes;
        self.original_bytes += other.original_bytes;
        self.compressed_bytes += other.compressed_bytes;
        self.errors.extend(other.errors);
        if self.archive_path.is_none() && other.archive_path.is_some() {
            self.archive_path = other.archive_path;
            self.archive_size = other.archive_size;
        }
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!(
                "completed: {} files processed, {} backed up, {} pruned",
                self.succeeded, self.backed_up, self.pruned
            )
        } else {
            format!(
                "completed with errors: {} succeeded, {} failed ({:.1}% failure rate)",
                self.succeeded,
                self.failed,
                self.failure_rate()
            )
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn ratio_percent(original: u64, written: u64) -> f64 {
    if original == 0 {
        return 100.0;
    }
    written as f64 / original as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn sample_error() -> FsOpsError {
        FsOpsError::io("prune.remove", "/var/log/a.log", io::Error::other("busy"))
    }

    #[test]
    fn failure_rate_is_zero_without_attempts() {
        let result = RunResult::new();
        assert!(result.failure_rate().abs() < f64::EPSILON);
        assert!(!result.has_errors());
    }

    #[test]
    fn failure_rate_counts_failed_over_attempted() {
        let mut result = RunResult::new();
        result.add_success(10);
        result.add_success(10);
        result.add_success(10);
        result.add_failure(Path::new("/var/log/a.log"), Operation::Prune, &sample_error());
        assert!((result.failure_rate() - 25.0).abs() < f64::EPSILON);
        assert_eq!(result.total_bytes, 30);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].operation, Operation::Prune);
        assert!(result.errors[0].cause.contains("busy"));
    }

    #[test]
    fn recovered_errors_do_not_count_as_failures() {
        let mut result = RunResult::new();
        result.record_error(Path::new("/mnt/b"), Operation::Backup, &sample_error());
        assert_eq!(result.failed, 0);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn merge_is_order_independent_for_counts() {
        let mut left = RunResult {
            succeeded: 2,
            backed_up: 2,
            total_bytes: 100,
            ..RunResult::default()
        };
        let mut right = RunResult {
            failed: 1,
            pruned: 3,
            archive_path: Some(PathBuf::from("/backup/backup-2026-01-24.tar.gz")),
            archive_size: 42,
            ..RunResult::default()
        };
        right.add_failure(Path::new("x"), Operation::Access, &sample_error());

        let mut forward = left.clone();
        forward.merge(right.clone());
        right.merge(left.clone());
        left = forward;

        assert_eq!(left.succeeded, right.succeeded);
        assert_eq!(left.failed, right.failed);
        assert_eq!(left.pruned, right.pruned);
        assert_eq!(left.total_bytes, right.total_bytes);
        assert_eq!(left.errors.len(), right.errors.len());
        assert_eq!(left.archive_path, right.archive_path);
        assert_eq!(left.archive_size, 42);
    }

    #[test]
    fn merge_keeps_first_archive_path() {
        let mut first = RunResult {
            archive_path: Some(PathBuf::from("/a.zip")),
            archive_size: 1,
            ..RunResult::default()
        };
        first.merge(RunResult {
            archive_path: Some(PathBuf::from("/b.zip")),
            archive_size: 2,
            ..RunResult::default()
        });
        assert_eq!(first.archive_path, Some(PathBuf::from("/a.zip")));
        assert_eq!(first.archive_size, 1);
    }

    #[test]
    fn compression_ratio_defaults_to_full_size() {
        let mut result = RunResult::new();
        assert!((result.compression_ratio() - 100.0).abs() < f64::EPSILON);
        result.original_bytes = 200;
        result.compressed_bytes = 50;
        assert!((result.compression_ratio() - 25.0).abs() < f64::EPSILON);
        assert!((result.space_saved() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_mentions_failures() {
        let mut result = RunResult::new();
        result.add_success(1);
        assert!(result.summary().starts_with("completed: 1 files processed"));
        result.add_failure(Path::new("a"), Operation::Backup, &sample_error());
        assert!(result.summary().contains("50.0% failure rate"));
    }
}
