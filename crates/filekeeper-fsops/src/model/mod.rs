//! Domain models for the backup/prune engine.
//!
//! # Design
//! - Keep records owned and cheap to clone so they can cross into blocking workers.
//! - Relative paths are the identity of a file under every destination root.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A regular file under the target root that qualified for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute (or root-joined) source path.
    pub source: PathBuf,
    /// Path relative to the target root; reproduced under each destination.
    pub relative: PathBuf,
    /// Size in bytes at selection time.
    pub size: u64,
    /// Modification time at selection time.
    pub modified: SystemTime,
}

impl FileRecord {
    /// Destination path for this file under `root`, before any compression suffix.
    #[must_use]
    pub fn destination_under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }

    /// Relative path rendered with `/` separators, as used for archive entry names.
    #[must_use]
    pub fn entry_name(&self) -> String {
        self.relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(relative: &str) -> FileRecord {
        FileRecord {
            source: Path::new("/var/log").join(relative),
            relative: PathBuf::from(relative),
            size: 3,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn same_base_names_map_to_distinct_destinations() {
        let first = record("app1/logs/error.log");
        let second = record("app2/logs/error.log");
        let root = Path::new("/backup");
        assert_ne!(first.destination_under(root), second.destination_under(root));
        assert_eq!(
            first.destination_under(root),
            PathBuf::from("/backup/app1/logs/error.log")
        );
    }

    #[test]
    fn entry_names_use_forward_slashes() {
        assert_eq!(record("a/b/c.log").entry_name(), "a/b/c.log");
        assert_eq!(record("top.log").entry_name(), "top.log");
    }
}
