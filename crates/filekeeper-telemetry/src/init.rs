//! Subscriber installation.
//!
//! # Design
//! - One entry point installs the global subscriber; a second call fails instead of replacing it.
//! - `RUST_LOG` overrides the configured level when set.
//! - The build version is recorded once and reused by every span.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Level used when the configuration leaves it empty.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_VERSION: OnceCell<String> = OnceCell::new();

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let filter = level_filter(config.level)?;
    let _ = BUILD_VERSION.set(config.version.to_string());

    let (json, text) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .with_span_list(false),
            ),
            None,
        ),
        LogFormat::Text => (None, Some(fmt::layer().with_target(false))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|source| TelemetryError::AlreadyInstalled { source })
}

/// Version recorded by [`init_logging`], or `dev` before logging is installed.
#[must_use]
pub fn build_version() -> &'static str {
    BUILD_VERSION.get().map_or("dev", String::as_str)
}

/// Logging settings taken from the configuration file and command line.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Level directive (`debug`, `info`, `warn`, `error`).
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Version stamped on the process span.
    pub version: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::Text,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable lines.
    Text,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else selects text.
    #[must_use]
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if level.is_empty() { DEFAULT_LOG_LEVEL } else { level };
    EnvFilter::try_new(level).map_err(|source| TelemetryError::InvalidLevel {
        level: level.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_setting_parses_variants() {
        assert_eq!(LogFormat::from_setting("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_setting("Json"), LogFormat::Json);
        assert_eq!(LogFormat::from_setting("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_setting(""), LogFormat::Text);
    }

    #[test]
    fn empty_level_falls_back_to_default() {
        assert!(level_filter("").is_ok());
        assert!(level_filter("debug").is_ok());
    }

    #[test]
    fn second_install_is_rejected() {
        let config = LoggingConfig {
            level: "warn",
            format: LogFormat::Json,
            version: "9.9.9",
        };
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::AlreadyInstalled { .. })
        ));
        assert_eq!(build_version(), "9.9.9");
    }
}
