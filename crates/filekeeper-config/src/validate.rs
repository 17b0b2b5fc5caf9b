//! Validation and parsing helpers for configuration documents.

use std::fs;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::defaults::{
    DEFAULT_GZIP_LEVEL, DEFAULT_LOG_LEVEL, LOG_LEVELS, MAX_GZIP_LEVEL, MIN_GZIP_LEVEL,
    SECONDS_PER_HOUR,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ArchiveFormat, ArchivePolicy, ArchiveSection, CompressionAlgorithm, CompressionPolicy,
    CompressionSection, GroupBy,
};

/// `[user@]host:path`, where neither user nor host may start with `-` so the
/// string can never be read as a transport option.
static REMOTE_DESTINATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9._-]*@)?[A-Za-z0-9_][A-Za-z0-9._-]*:.+$").ok()
});

/// Check that a remote destination has the `[user@]host:path` shape.
#[must_use]
pub fn is_valid_remote_destination(value: &str) -> bool {
    REMOTE_DESTINATION
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

pub(crate) fn parse_prune_after(hours: f64) -> ConfigResult<Duration> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ConfigError::invalid(
            "root",
            "prune_after_hours",
            Some(hours.to_string()),
            "must be positive",
        ));
    }
    Duration::try_from_secs_f64(hours * SECONDS_PER_HOUR).map_err(|_| {
        ConfigError::invalid(
            "root",
            "prune_after_hours",
            Some(hours.to_string()),
            "is too large",
        )
    })
}

pub(crate) fn parse_run_interval(seconds: i64) -> ConfigResult<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::invalid(
                "root",
                "run_interval",
                Some(seconds.to_string()),
                "must be positive",
            )
        })
}

pub(crate) fn ensure_target_folder(value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::invalid(
            "root",
            "target_folder",
            None,
            "is required",
        ));
    }
    match fs::metadata(value) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::invalid(
            "root",
            "target_folder",
            Some(value.to_string()),
            "is not a directory",
        )),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::invalid(
            "root",
            "target_folder",
            Some(value.to_string()),
            "does not exist",
        )),
        Err(_) => Err(ConfigError::invalid(
            "root",
            "target_folder",
            Some(value.to_string()),
            "cannot be accessed",
        )),
    }
}

pub(crate) fn ensure_backup_paths(enabled: bool, paths: &[impl AsRef<Path>]) -> ConfigResult<()> {
    if !enabled {
        return Ok(());
    }
    if paths.is_empty() {
        return Err(ConfigError::invalid(
            "root",
            "backup_paths",
            None,
            "at least one backup path is required when enable_backup is true",
        ));
    }
    for path in paths {
        let path = path.as_ref();
        if fs::metadata(path).is_ok_and(|meta| !meta.is_dir()) {
            return Err(ConfigError::invalid(
                "root",
                "backup_paths",
                Some(path.display().to_string()),
                "exists but is not a directory",
            ));
        }
    }
    Ok(())
}

pub(crate) fn ensure_remote_destinations(remotes: &[String]) -> ConfigResult<()> {
    for remote in remotes {
        if !is_valid_remote_destination(remote) {
            return Err(ConfigError::invalid(
                "root",
                "remote_backups",
                Some(remote.clone()),
                "expected user@host:/path or host:/path",
            ));
        }
    }
    Ok(())
}

pub(crate) fn parse_log_level(value: &str) -> ConfigResult<String> {
    if value.is_empty() {
        return Ok(DEFAULT_LOG_LEVEL.to_string());
    }
    let level = value.to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::invalid(
            "root",
            "log_level",
            Some(value.to_string()),
            "must be one of: debug, info, warn, error",
        ))
    }
}

pub(crate) fn parse_error_threshold(value: f64) -> ConfigResult<f64> {
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            "root",
            "error_threshold_percent",
            Some(value.to_string()),
            "must be between 0 and 100",
        ))
    }
}

pub(crate) fn parse_compression(section: Option<&CompressionSection>) -> ConfigResult<CompressionPolicy> {
    let Some(section) = section.filter(|section| section.enabled) else {
        return Ok(CompressionPolicy::disabled());
    };

    let algorithm = if section.algorithm.is_empty() {
        CompressionAlgorithm::Gzip
    } else {
        section.algorithm.parse()?
    };

    let level = if section.level == 0 {
        DEFAULT_GZIP_LEVEL
    } else {
        u32::try_from(section.level)
            .ok()
            .filter(|level| (MIN_GZIP_LEVEL..=MAX_GZIP_LEVEL).contains(level))
            .ok_or_else(|| {
                ConfigError::invalid(
                    "compression",
                    "level",
                    Some(section.level.to_string()),
                    "gzip level must be between 1 and 9",
                )
            })?
    };

    Ok(CompressionPolicy {
        enabled: true,
        algorithm,
        level,
    })
}

pub(crate) fn parse_archive(section: Option<&ArchiveSection>) -> ConfigResult<ArchivePolicy> {
    let Some(section) = section.filter(|section| section.enabled) else {
        return Ok(ArchivePolicy::disabled());
    };

    let format = if section.format.is_empty() {
        ArchiveFormat::TarGz
    } else {
        section.format.parse()?
    };
    let group_by = if section.group_by.is_empty() {
        GroupBy::Daily
    } else {
        section.group_by.parse()?
    };

    Ok(ArchivePolicy::new(format, group_by))
}

pub(crate) fn ensure_exclusive(
    compression: &CompressionPolicy,
    archive: &ArchivePolicy,
) -> ConfigResult<()> {
    if compression.enabled && archive.enabled {
        return Err(ConfigError::Conflict {
            first: "archive",
            second: "compression",
            hint: "use archive format 'tar.gz' for compressed archives",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_destination_shapes() {
        assert!(is_valid_remote_destination("user@host:/backup"));
        assert!(is_valid_remote_destination("host:/backup"));
        assert!(is_valid_remote_destination("backup.example.com:relative/dir"));
        assert!(!is_valid_remote_destination("/local/path"));
        assert!(!is_valid_remote_destination("host:"));
        assert!(!is_valid_remote_destination("-oProxyCommand=x:/tmp"));
        assert!(!is_valid_remote_destination("-v:/tmp"));
        assert!(!is_valid_remote_destination("user name@host:/tmp"));
        assert!(!is_valid_remote_destination("host;rm -rf /:/tmp"));
    }

    #[test]
    fn prune_after_rejects_non_positive() {
        assert!(parse_prune_after(0.0).is_err());
        assert!(parse_prune_after(-1.0).is_err());
        assert!(parse_prune_after(f64::NAN).is_err());
        assert!(matches!(parse_prune_after(1.5), Ok(d) if d == Duration::from_secs(5400)));
    }

    #[test]
    fn run_interval_must_be_positive() {
        assert!(parse_run_interval(0).is_err());
        assert!(parse_run_interval(-5).is_err());
        assert!(matches!(parse_run_interval(60), Ok(d) if d == Duration::from_secs(60)));
    }

    #[test]
    fn compression_defaults_are_filled() -> ConfigResult<()> {
        let section = CompressionSection {
            enabled: true,
            algorithm: String::new(),
            level: 0,
        };
        let policy = parse_compression(Some(&section))?;
        assert_eq!(policy, CompressionPolicy::gzip(DEFAULT_GZIP_LEVEL));

        let disabled = CompressionSection {
            enabled: false,
            algorithm: "bogus".into(),
            level: 99,
        };
        assert_eq!(parse_compression(Some(&disabled))?, CompressionPolicy::disabled());
        assert_eq!(parse_compression(None)?, CompressionPolicy::disabled());
        Ok(())
    }

    #[test]
    fn compression_level_range_is_enforced() {
        for level in [-1, 10, 42] {
            let section = CompressionSection {
                enabled: true,
                algorithm: "gzip".into(),
                level,
            };
            assert!(parse_compression(Some(&section)).is_err(), "level {level}");
        }
    }

    #[test]
    fn archive_defaults_are_filled() -> ConfigResult<()> {
        let section = ArchiveSection {
            enabled: true,
            ..ArchiveSection::default()
        };
        let policy = parse_archive(Some(&section))?;
        assert_eq!(policy, ArchivePolicy::new(ArchiveFormat::TarGz, GroupBy::Daily));
        Ok(())
    }

    #[test]
    fn threshold_and_log_level_ranges() {
        assert!(parse_error_threshold(-0.1).is_err());
        assert!(parse_error_threshold(100.1).is_err());
        assert!(parse_error_threshold(10.0).is_ok());
        assert!(matches!(parse_log_level("").as_deref(), Ok("info")));
        assert!(matches!(parse_log_level("WARN").as_deref(), Ok("warn")));
        assert!(parse_log_level("trace").is_err());
    }

    #[test]
    fn archive_and_compression_are_exclusive() {
        let err = ensure_exclusive(
            &CompressionPolicy::gzip(6),
            &ArchivePolicy::new(ArchiveFormat::Zip, GroupBy::Monthly),
        );
        assert!(matches!(err, Err(ConfigError::Conflict { .. })));
        assert!(ensure_exclusive(&CompressionPolicy::disabled(), &ArchivePolicy::default()).is_ok());
    }
}
