//! # Design
//!
//! - Cycles run back to back with a cancellable sleep in between.
//! - A shutdown signal only cancels the token; the cycle in flight winds down on its own.
//! - In single-run mode a cycle error becomes the process error unless it was a cancellation.

use std::io;
use std::time::Duration;

use filekeeper_config::{Config, RunParameters};
use filekeeper_fsops::BackupService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// When and how often cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Stop after the first cycle.
    pub once: bool,
}

impl Schedule {
    /// Schedule taken from the configured run interval.
    #[must_use]
    pub const fn from_config(config: &Config, once: bool) -> Self {
        Self {
            interval: config.run_interval,
            once,
        }
    }
}

/// Run cycles until cancelled or, with [`Schedule::once`], after one cycle.
///
/// # Errors
///
/// In single-run mode, returns the cycle's error unless the cycle was cancelled.
pub async fn run_loop(
    service: &BackupService,
    params: &RunParameters,
    schedule: Schedule,
    cancel: &CancellationToken,
) -> AppResult<()> {
    loop {
        if cancel.is_cancelled() {
            info!("shutdown complete");
            return Ok(());
        }

        let report = service.run_cycle(params, cancel).await;
        if schedule.once {
            let cancelled = report.is_cancelled();
            return match report.status {
                Err(err) if !cancelled => Err(AppError::fsops("run_cycle", err)),
                _ => {
                    info!("single run complete, exiting");
                    Ok(())
                }
            };
        }

        tokio::select! {
            () = cancel.cancelled() => {
                info!("shutdown complete");
                return Ok(());
            }
            () = tokio::time::sleep(schedule.interval) => {}
        }
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM (ctrl-c elsewhere).
///
/// The task exits quietly if the token is cancelled first.
#[must_use]
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let received = tokio::select! {
            received = wait_for_signal() => received,
            () = cancel.cancelled() => return,
        };
        match received {
            Ok(signal) => {
                info!(signal, "shutdown signal received");
                info!("finishing current operation, please wait");
                cancel.cancel();
            }
            Err(err) => warn!(error = %err, "signal listener failed"),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        received = tokio::signal::ctrl_c() => received.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
