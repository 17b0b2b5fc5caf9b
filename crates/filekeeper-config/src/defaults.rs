//! Default values filled in once when a configuration document is ingested.
//!
//! # Design
//! - Keep every implicit value in one place so the engine never guesses.

/// Gzip level used when compression is enabled without an explicit level.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;
/// Lowest accepted gzip level.
pub const MIN_GZIP_LEVEL: u32 = 1;
/// Highest accepted gzip level.
pub const MAX_GZIP_LEVEL: u32 = 9;
/// Log level used when the document leaves `log_level` empty.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Accepted log levels.
pub const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];
/// Seconds in one hour, used to convert `prune_after_hours`.
pub(crate) const SECONDS_PER_HOUR: f64 = 3600.0;
