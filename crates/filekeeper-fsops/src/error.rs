//! # Design
//!
//! - Messages are constant; paths, destinations and rates travel as fields.
//! - `describe` flattens the operation and source chain for per-file error records.
//! - Terminal variants stop the cycle; everything else is recorded and the walk goes on.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the backup/prune engine.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// A filesystem call failed.
    #[error("filesystem operation failed")]
    Io {
        /// Step that issued the call, e.g. `compress.rename`.
        operation: &'static str,
        /// File or directory the call was about.
        path: PathBuf,
        /// Error reported by the OS.
        source: io::Error,
    },
    /// The tree walk could not read an entry.
    #[error("directory walk failed")]
    Walkdir {
        /// Step that was walking.
        operation: &'static str,
        /// Entry that could not be read.
        path: PathBuf,
        /// Error reported by the walker.
        source: walkdir::Error,
    },
    /// Reading or writing a zip container failed.
    #[error("zip container failure")]
    Zip {
        /// Step that touched the container.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Error reported by the zip codec.
        source: zip::result::ZipError,
    },
    /// Every configured local destination failed for one file.
    #[error("fsops backup failed on every destination")]
    AllDestinationsFailed {
        /// Source file that could not be replicated.
        path: PathBuf,
        /// Number of destinations attempted.
        attempted: usize,
    },
    /// The external secure-copy transport reported a failure.
    #[error("fsops remote transport failure")]
    Transport {
        /// Local artifact being pushed.
        source_path: PathBuf,
        /// Remote destination string.
        destination: String,
        /// Exit status code when the process ran to completion.
        status: Option<i32>,
        /// Combined transport output, trimmed.
        output: String,
    },
    /// Spawning the external transport process failed.
    #[error("fsops remote transport could not start")]
    TransportSpawn {
        /// Program that could not be started.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The failure-rate breaker tripped.
    #[error("fsops error threshold exceeded")]
    ThresholdExceeded {
        /// Observed failure rate in percent.
        failure_rate: f64,
        /// Configured threshold in percent.
        threshold: f64,
    },
    /// A shutdown request interrupted the cycle.
    #[error("fsops cycle cancelled")]
    Cancelled,
    /// Run parameters were unusable; raised before any file is processed.
    #[error("fsops invalid policy")]
    InvalidPolicy {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Unsupported operation or mode.
    #[error("fsops unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
    /// A blocking worker panicked or was aborted.
    #[error("fsops worker failure")]
    Worker {
        /// Operation the worker was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn worker(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Worker { operation, source }
    }

    /// Whether this error ends the whole cycle rather than a single file.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::ThresholdExceeded { .. } | Self::InvalidPolicy { .. }
        )
    }

    /// Render the error together with its source chain on a single line.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut rendered = self.to_string();
        match self {
            Self::Io { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Zip { operation, .. }
            | Self::Worker { operation, .. } => {
                rendered.push_str(&format!(" ({operation})"));
            }
            Self::Transport { status, output, .. } => {
                if let Some(code) = status {
                    rendered.push_str(&format!(" (exit status {code})"));
                }
                if !output.is_empty() {
                    rendered.push_str(&format!(": {output}"));
                }
            }
            Self::ThresholdExceeded {
                failure_rate,
                threshold,
            } => {
                rendered.push_str(&format!(
                    ": {failure_rate:.1}% failures (threshold: {threshold:.1}%)"
                ));
            }
            Self::InvalidPolicy { field, reason, .. } | Self::InvalidInput { field, reason, .. } => {
                rendered.push_str(&format!(": {field} {reason}"));
            }
            _ => {}
        }
        let mut source = self.source();
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn io_error() -> io::Error {
        io::Error::other("io")
    }

    #[test]
    fn fsops_error_helpers_build_variants() -> Result<(), Box<dyn Error>> {
        let io_err = FsOpsError::io("read", "path", io_error());
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());

        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = FsOpsError::walkdir("walk", &missing, walkdir_error);
        assert!(matches!(walk_err, FsOpsError::Walkdir { .. }));
        assert!(walk_err.source().is_some());

        let zip_err = FsOpsError::zip("unpack", "archive.zip", zip::result::ZipError::FileNotFound);
        assert!(matches!(zip_err, FsOpsError::Zip { .. }));
        assert!(zip_err.source().is_some());
        Ok(())
    }

    #[test]
    fn describe_includes_operation_and_cause() {
        let err = FsOpsError::io("compress.create", "/backup/a.log", io_error());
        assert_eq!(err.describe(), "filesystem operation failed (compress.create): io");

        let threshold = FsOpsError::ThresholdExceeded {
            failure_rate: 50.0,
            threshold: 10.0,
        };
        assert_eq!(
            threshold.describe(),
            "fsops error threshold exceeded: 50.0% failures (threshold: 10.0%)"
        );

        let transport = FsOpsError::Transport {
            source_path: PathBuf::from("/backup/a.log"),
            destination: "host:/srv".into(),
            status: Some(1),
            output: "lost connection".into(),
        };
        assert!(transport.describe().ends_with("(exit status 1): lost connection"));
    }

    #[test]
    fn terminal_errors_are_flagged() {
        assert!(FsOpsError::Cancelled.is_terminal());
        assert!(
            FsOpsError::ThresholdExceeded {
                failure_rate: 1.0,
                threshold: 0.5
            }
            .is_terminal()
        );
        assert!(!FsOpsError::io("read", "path", io_error()).is_terminal());
        assert!(
            !FsOpsError::AllDestinationsFailed {
                path: PathBuf::from("a"),
                attempted: 2
            }
            .is_terminal()
        );
    }
}
