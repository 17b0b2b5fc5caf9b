//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured level was not a valid filter directive.
    #[error("invalid log level")]
    InvalidLevel {
        /// Level string as configured.
        level: String,
        /// Directive parse failure.
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed")]
    AlreadyInstalled {
        /// Underlying installation failure.
        source: tracing_subscriber::util::TryInitError,
    },
}
