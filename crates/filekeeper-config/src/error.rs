//! Error types for configuration operations.
//!
//! # Design
//! - Messages name the offending field so `--validate` output is actionable.
//! - Structured fields stay available for tests and callers that branch on them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration document failed.
    #[error("failed to read configuration file {path}")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the configuration document.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The configuration document was not valid JSON for the expected shape.
    #[error("failed to parse configuration file {path}")]
    Parse {
        /// Path of the configuration document.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid value for '{field}' in '{section}': {reason}")]
    InvalidField {
        /// Section that failed validation (`root`, `compression`, `archive`).
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Human-readable reason for the failure.
        reason: &'static str,
    },
    /// Two fields were enabled together although they exclude each other.
    #[error("'{first}' and '{second}' cannot be enabled at the same time: {hint}")]
    Conflict {
        /// First conflicting field.
        first: &'static str,
        /// Second conflicting field.
        second: &'static str,
        /// Suggested resolution.
        hint: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
