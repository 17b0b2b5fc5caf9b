use std::path::Path;
use std::process::ExitCode;

use filekeeper_config::{Config, LogFormat, load_config};
use filekeeper_fsops::BackupService;
use filekeeper_telemetry::{GlobalContextGuard, LoggingConfig, build_version, init_logging};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;
use crate::error::{AppError, AppResult, render_chain};
use crate::runner::{Schedule, run_loop, spawn_shutdown_listener};

/// Entry point for the filekeeper boot sequence.
///
/// `--validate` reports on the configuration and returns without logging
/// anything. Otherwise logging is installed, shutdown signals are wired to a
/// cancellation token and cycles run until shutdown (or once).
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, logging cannot be
/// installed, or a single run fails for a reason other than cancellation.
#[allow(clippy::future_not_send)]
pub async fn run_app(cli: &Cli) -> AppResult<ExitCode> {
    if cli.validate {
        return Ok(match check_config(&cli.config) {
            Ok(()) => {
                println!("Configuration is valid");
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("Configuration invalid: {message}");
                ExitCode::FAILURE
            }
        });
    }

    let config =
        load_config(&cli.config).map_err(|err| AppError::config("load_config", err))?;
    init_logging(&logging_config(cli, &config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(cli.mode());

    if cli.dry_run {
        info!(dry_run = true, "dry-run: no changes will be made");
    }
    info!(
        version = build_version(),
        prune_after_hours = config.prune_after.as_secs_f64() / 3600.0,
        run_interval_secs = config.run_interval.as_secs(),
        target_folder = %config.target_folder.display(),
        backup_enabled = config.enable_backup,
        dry_run = cli.dry_run,
        once = cli.once,
        "filekeeper started"
    );

    let cancel = CancellationToken::new();
    let listener = spawn_shutdown_listener(cancel.clone());
    let outcome = run_loop(
        &BackupService::new(),
        &config.run_parameters(cli.dry_run),
        Schedule::from_config(&config, cli.once),
        &cancel,
    )
    .await;
    listener.abort();

    outcome.map(|()| ExitCode::SUCCESS)
}

/// Load and validate the configuration at `path`.
///
/// # Errors
///
/// Returns the rendered error chain of the first problem found.
pub fn check_config(path: &Path) -> Result<(), String> {
    load_config(path)
        .map(|_| ())
        .map_err(|err| render_chain(&err))
}

fn logging_config<'a>(cli: &Cli, config: &'a Config) -> LoggingConfig<'a> {
    LoggingConfig {
        level: cli.log_level(&config.log_level),
        format: match config.log_format {
            LogFormat::Json => filekeeper_telemetry::LogFormat::Json,
            LogFormat::Text => filekeeper_telemetry::LogFormat::Text,
        },
        version: env!("CARGO_PKG_VERSION"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &serde_json::Value) -> Result<std::path::PathBuf> {
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_vec_pretty(body)?)?;
        Ok(path)
    }

    #[test]
    fn verbose_forces_debug_and_formats_map_across() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_config(
            &dir,
            &serde_json::json!({
                "prune_after_hours": 24,
                "target_folder": dir.path(),
                "run_interval": 60,
                "log_level": "warn",
                "log_format": "json"
            }),
        )?;
        let config = load_config(&path)?;

        let quiet = Cli::try_parse_from(["filekeeper"])?;
        let logging = logging_config(&quiet, &config);
        assert_eq!(logging.level, "warn");
        assert_eq!(logging.format, filekeeper_telemetry::LogFormat::Json);

        let verbose = Cli::try_parse_from(["filekeeper", "-v"])?;
        assert_eq!(logging_config(&verbose, &config).level, "debug");
        Ok(())
    }

    #[test]
    fn check_config_reports_the_offending_field() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_config(
            &dir,
            &serde_json::json!({
                "prune_after_hours": -1,
                "target_folder": dir.path(),
                "run_interval": 60
            }),
        )?;
        let message = check_config(&path).err().unwrap_or_default();
        assert!(message.contains("prune_after_hours"), "{message}");
        Ok(())
    }
}
