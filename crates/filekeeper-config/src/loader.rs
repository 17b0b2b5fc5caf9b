//! JSON configuration loader.
//!
//! # Design
//! - Read and parse the document, then validate and fill defaults in one pass.
//! - Validation order follows the document: scalars first, then destinations, then policies.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{Config, ConfigDocument, LogFormat};
use crate::validate::{
    ensure_backup_paths, ensure_exclusive, ensure_remote_destinations, ensure_target_folder,
    parse_archive, parse_compression, parse_error_threshold, parse_log_level, parse_prune_after,
    parse_run_interval,
};

/// Read, parse and validate the configuration document at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or fails validation.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    let document = read_document(path)?;
    let config = Config::from_document(&document)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Read and parse the document at `path` without validating it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn read_document(path: &Path) -> ConfigResult<ConfigDocument> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "load_config.read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Validate a raw document and fill every default.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn from_document(document: &ConfigDocument) -> ConfigResult<Self> {
        let prune_after = parse_prune_after(document.prune_after_hours)?;
        let run_interval = parse_run_interval(document.run_interval)?;
        ensure_target_folder(&document.target_folder)?;

        let backup_paths = document.local_destinations();
        ensure_backup_paths(document.enable_backup, &backup_paths)?;
        let remote_backups = document.remote_destinations();
        ensure_remote_destinations(&remote_backups)?;

        let log_level = parse_log_level(&document.log_level)?;
        let log_format = if document.log_format.is_empty() {
            LogFormat::default()
        } else {
            document.log_format.parse()?
        };
        let error_threshold_percent = parse_error_threshold(document.error_threshold_percent)?;

        let compression = parse_compression(document.compression.as_ref())?;
        let archive = parse_archive(document.archive.as_ref())?;
        ensure_exclusive(&compression, &archive)?;

        Ok(Self {
            prune_after,
            target_folder: document.target_folder.clone().into(),
            run_interval,
            backup_paths,
            remote_backups,
            enable_backup: document.enable_backup,
            log_level,
            log_format,
            error_threshold_percent,
            compression,
            archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveSection, CompressionAlgorithm, CompressionSection};
    use std::time::Duration;
    use tempfile::TempDir;

    fn base_document(target: &Path) -> ConfigDocument {
        ConfigDocument {
            prune_after_hours: 24.0,
            target_folder: target.display().to_string(),
            run_interval: 60,
            ..ConfigDocument::default()
        }
    }

    #[test]
    fn minimal_document_fills_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config = Config::from_document(&base_document(temp.path()))?;
        assert_eq!(config.prune_after, Duration::from_secs(24 * 3600));
        assert_eq!(config.run_interval, Duration::from_secs(60));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.compression.enabled);
        assert!(!config.archive.enabled);
        Ok(())
    }

    #[test]
    fn backup_requires_a_destination() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut document = base_document(temp.path());
        document.enable_backup = true;
        assert!(Config::from_document(&document).is_err());

        document.backup_paths = vec![temp.path().join("backup").display().to_string()];
        let config = Config::from_document(&document)?;
        assert_eq!(config.backup_paths.len(), 1);
        Ok(())
    }

    #[test]
    fn backup_path_pointing_at_a_file_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("occupied");
        fs::write(&file, b"x")?;
        let mut document = base_document(temp.path());
        document.enable_backup = true;
        document.backup_path = file.display().to_string();
        assert!(matches!(
            Config::from_document(&document),
            Err(ConfigError::InvalidField {
                field: "backup_paths",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn missing_target_folder_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let document = base_document(&temp.path().join("absent"));
        assert!(matches!(
            Config::from_document(&document),
            Err(ConfigError::InvalidField {
                field: "target_folder",
                reason: "does not exist",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn malformed_remote_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut document = base_document(temp.path());
        document.remote_backup = "not-a-remote".into();
        assert!(Config::from_document(&document).is_err());
        Ok(())
    }

    #[test]
    fn archive_with_compression_is_a_conflict() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut document = base_document(temp.path());
        document.compression = Some(CompressionSection {
            enabled: true,
            algorithm: "gzip".into(),
            level: 6,
        });
        document.archive = Some(ArchiveSection {
            enabled: true,
            format: "tar.gz".into(),
            group_by: "daily".into(),
        });
        assert!(matches!(
            Config::from_document(&document),
            Err(ConfigError::Conflict { .. })
        ));
        Ok(())
    }

    #[test]
    fn load_config_reads_json_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");
        let body = serde_json::json!({
            "prune_after_hours": 12,
            "target_folder": temp.path(),
            "run_interval": 30,
            "log_format": "json",
            "compression": {"enabled": true, "algorithm": "gzip", "level": 9}
        });
        fs::write(&path, serde_json::to_vec(&body)?)?;

        let config = load_config(&path)?;
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.compression.algorithm, CompressionAlgorithm::Gzip);
        assert_eq!(config.compression.level, 9);

        let params = config.run_parameters(true);
        assert!(params.dry_run);
        assert_eq!(params.age_threshold, Duration::from_secs(12 * 3600));
        Ok(())
    }

    #[test]
    fn load_config_reports_parse_and_io_failures() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing.json");
        assert!(matches!(load_config(&missing), Err(ConfigError::Io { .. })));

        let garbage = temp.path().join("garbage.json");
        fs::write(&garbage, b"{ not json")?;
        assert!(matches!(load_config(&garbage), Err(ConfigError::Parse { .. })));
        Ok(())
    }
}
