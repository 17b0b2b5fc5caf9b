//! Typed configuration models.
//!
//! # Design
//! - `ConfigDocument` mirrors the JSON file verbatim; every field is optional on disk.
//! - `Config` is the validated, default-filled form produced once at ingestion.
//! - `RunParameters` is the immutable per-cycle snapshot handed to the engine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Compression section of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSection {
    /// Enable per-file compression of backups.
    pub enabled: bool,
    /// Algorithm name (`none`, `gzip`); empty selects the default.
    pub algorithm: String,
    /// Algorithm-specific level; `0` selects the default.
    pub level: i32,
}

/// Archive section of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    /// Bundle all qualifying files of a cycle into a single archive.
    pub enabled: bool,
    /// Container format (`tar`, `tar.gz`, `zip`); empty selects the default.
    pub format: String,
    /// Grouping granularity (`daily`, `weekly`, `monthly`); empty selects the default.
    pub group_by: String,
}

/// Raw configuration document as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Age in hours after which a file qualifies for backup and pruning.
    pub prune_after_hours: f64,
    /// Directory tree scanned each cycle.
    pub target_folder: String,
    /// Seconds to sleep between cycles.
    pub run_interval: i64,
    /// Single local backup path (kept for older documents).
    pub backup_path: String,
    /// Additional local backup paths.
    pub backup_paths: Vec<String>,
    /// Single remote destination (kept for older documents).
    pub remote_backup: String,
    /// Additional remote destinations.
    pub remote_backups: Vec<String>,
    /// Whether files are replicated before they are pruned.
    pub enable_backup: bool,
    /// Log level (`debug`, `info`, `warn`, `error`).
    pub log_level: String,
    /// Log output format (`text`, `json`).
    pub log_format: String,
    /// Maximum failure percentage before a cycle stops; `0` disables the breaker.
    pub error_threshold_percent: f64,
    /// Optional per-file compression settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionSection>,
    /// Optional archive-mode settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveSection>,
}

/// Per-file compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Verbatim copy.
    #[default]
    None,
    /// Gzip stream.
    Gzip,
}

impl CompressionAlgorithm {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        }
    }

    /// Suffix appended to the destination file name.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            _ => Err(ConfigError::invalid(
                "compression",
                "algorithm",
                Some(value.to_string()),
                "unknown algorithm (supported: none, gzip)",
            )),
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression policy applied to each replicated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionPolicy {
    /// Whether compression was requested.
    pub enabled: bool,
    /// Algorithm used when enabled.
    pub algorithm: CompressionAlgorithm,
    /// Algorithm-specific level, already range-checked.
    pub level: u32,
}

impl CompressionPolicy {
    /// Policy that copies files verbatim.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            algorithm: CompressionAlgorithm::None,
            level: crate::defaults::DEFAULT_GZIP_LEVEL,
        }
    }

    /// Gzip policy at the given level.
    #[must_use]
    pub const fn gzip(level: u32) -> Self {
        Self {
            enabled: true,
            algorithm: CompressionAlgorithm::Gzip,
            level,
        }
    }

    /// Algorithm that will actually be applied, accounting for the enabled flag.
    #[must_use]
    pub const fn effective_algorithm(&self) -> CompressionAlgorithm {
        if self.enabled {
            self.algorithm
        } else {
            CompressionAlgorithm::None
        }
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Container format used in archive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Uncompressed tar stream.
    #[serde(rename = "tar")]
    Tar,
    /// Gzip-compressed tar stream.
    #[default]
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zip container with deflate entries.
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// File extension, including the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Tar => ".tar",
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "tar" => Ok(Self::Tar),
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            _ => Err(ConfigError::invalid(
                "archive",
                "format",
                Some(value.to_string()),
                "unknown archive format (supported: tar, tar.gz, zip)",
            )),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granularity used to derive archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// `backup-YYYY-MM-DD`.
    #[default]
    Daily,
    /// `backup-YYYY-Www` (ISO week).
    Weekly,
    /// `backup-YYYY-MM`.
    Monthly,
}

impl GroupBy {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl FromStr for GroupBy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(ConfigError::invalid(
                "archive",
                "group_by",
                Some(value.to_string()),
                "unknown grouping (supported: daily, weekly, monthly)",
            )),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive-mode policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchivePolicy {
    /// Whether archive mode replaces per-file replication.
    pub enabled: bool,
    /// Container format.
    pub format: ArchiveFormat,
    /// Naming granularity.
    pub group_by: GroupBy,
}

impl ArchivePolicy {
    /// Policy with archive mode switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled policy for the given format and grouping.
    #[must_use]
    pub const fn new(format: ArchiveFormat, group_by: GroupBy) -> Self {
        Self {
            enabled: true,
            format,
            group_by,
        }
    }
}

/// Log output format requested by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid(
                "root",
                "log_format",
                Some(value.to_string()),
                "must be 'text' or 'json'",
            )),
        }
    }
}

/// Validated configuration with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Age after which a file qualifies.
    pub prune_after: Duration,
    /// Directory tree scanned each cycle.
    pub target_folder: PathBuf,
    /// Sleep between cycles.
    pub run_interval: Duration,
    /// Ordered, de-duplicated local destinations.
    pub backup_paths: Vec<PathBuf>,
    /// Ordered, de-duplicated remote destinations.
    pub remote_backups: Vec<String>,
    /// Whether files are replicated before pruning.
    pub enable_backup: bool,
    /// Lower-cased log level.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Failure-rate breaker threshold in percent; `0` disables it.
    pub error_threshold_percent: f64,
    /// Per-file compression policy.
    pub compression: CompressionPolicy,
    /// Archive-mode policy.
    pub archive: ArchivePolicy,
}

impl Config {
    /// Snapshot the parameters for one cycle.
    #[must_use]
    pub fn run_parameters(&self, dry_run: bool) -> RunParameters {
        RunParameters {
            age_threshold: self.prune_after,
            target_root: self.target_folder.clone(),
            local_destinations: self.backup_paths.clone(),
            remote_destinations: self.remote_backups.clone(),
            backup_enabled: self.enable_backup,
            error_threshold_percent: self.error_threshold_percent,
            compression: self.compression,
            archive: self.archive,
            dry_run,
        }
    }
}

/// Immutable inputs for a single backup/prune cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    /// Files modified before `now - age_threshold` qualify.
    pub age_threshold: Duration,
    /// Root of the scanned tree.
    pub target_root: PathBuf,
    /// Local destination roots, in priority order.
    pub local_destinations: Vec<PathBuf>,
    /// Remote `[user@]host:path` destinations.
    pub remote_destinations: Vec<String>,
    /// Whether the backup phase runs.
    pub backup_enabled: bool,
    /// Failure-rate breaker threshold in percent; `0` disables it.
    pub error_threshold_percent: f64,
    /// Per-file compression policy.
    pub compression: CompressionPolicy,
    /// Archive-mode policy.
    pub archive: ArchivePolicy,
    /// Compute and log actions without touching the filesystem.
    pub dry_run: bool,
}

impl RunParameters {
    /// Parameters that prune `target_root` without any backup.
    #[must_use]
    pub fn prune_only(target_root: impl Into<PathBuf>, age_threshold: Duration) -> Self {
        Self {
            age_threshold,
            target_root: target_root.into(),
            local_destinations: Vec::new(),
            remote_destinations: Vec::new(),
            backup_enabled: false,
            error_threshold_percent: 0.0,
            compression: CompressionPolicy::disabled(),
            archive: ArchivePolicy::disabled(),
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() -> Result<(), ConfigError> {
        assert_eq!("GZIP".parse::<CompressionAlgorithm>()?, CompressionAlgorithm::Gzip);
        assert_eq!("Tar.Gz".parse::<ArchiveFormat>()?, ArchiveFormat::TarGz);
        assert_eq!("weekly".parse::<GroupBy>()?, GroupBy::Weekly);
        assert_eq!("JSON".parse::<LogFormat>()?, LogFormat::Json);
        assert!("brotli".parse::<CompressionAlgorithm>().is_err());
        assert!("rar".parse::<ArchiveFormat>().is_err());
        assert!("hourly".parse::<GroupBy>().is_err());
        Ok(())
    }

    #[test]
    fn extensions_match_formats() {
        assert_eq!(CompressionAlgorithm::Gzip.extension(), ".gz");
        assert_eq!(CompressionAlgorithm::None.extension(), "");
        assert_eq!(ArchiveFormat::Tar.extension(), ".tar");
        assert_eq!(ArchiveFormat::TarGz.extension(), ".tar.gz");
        assert_eq!(ArchiveFormat::Zip.extension(), ".zip");
    }

    #[test]
    fn disabled_compression_never_applies_algorithm() {
        let policy = CompressionPolicy {
            enabled: false,
            algorithm: CompressionAlgorithm::Gzip,
            level: 9,
        };
        assert_eq!(policy.effective_algorithm(), CompressionAlgorithm::None);
        assert_eq!(
            CompressionPolicy::gzip(3).effective_algorithm(),
            CompressionAlgorithm::Gzip
        );
    }

    #[test]
    fn document_deserializes_partial_json() -> Result<(), serde_json::Error> {
        let doc: ConfigDocument = serde_json::from_str(
            r#"{"prune_after_hours": 24, "target_folder": "/var/log/app", "archive": {"enabled": true}}"#,
        )?;
        assert!((doc.prune_after_hours - 24.0).abs() < f64::EPSILON);
        assert_eq!(doc.target_folder, "/var/log/app");
        assert!(doc.compression.is_none());
        let archive = doc.archive.unwrap_or_default();
        assert!(archive.enabled);
        assert!(archive.format.is_empty());
        Ok(())
    }
}
