//! # Design
//!
//! - Centralize application-level errors for bootstrap and the cycle loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;
use std::fmt::Write as _;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: filekeeper_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: filekeeper_telemetry::TelemetryError,
    },
    /// A backup/prune cycle failed.
    #[error("backup cycle failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: filekeeper_fsops::FsOpsError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: filekeeper_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: filekeeper_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(
        operation: &'static str,
        source: filekeeper_fsops::FsOpsError,
    ) -> Self {
        Self::FsOps { operation, source }
    }
}

/// Render an error and every source beneath it on one line.
pub(crate) fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        let _ = write!(rendered, ": {source}");
        current = source.source();
    }
    rendered
}
