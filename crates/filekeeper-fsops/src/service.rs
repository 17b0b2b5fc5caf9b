//! Cycle orchestration: select, replicate or archive, then prune.
//!
//! # Design
//! - One call to [`BackupService::run_cycle`] is one pass of
//!   `SelectAndReplicate -> Prune -> Done | Cancelled | ThresholdExceeded`.
//! - The cycle owns a single `RunResult`; per-file and per-destination results are
//!   merged into it sequentially after each fan-in.
//! - The report always carries the partial result, even when the status is an error.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{Local, NaiveDate};
use filekeeper_config::RunParameters;
use filekeeper_telemetry::cycle_span;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::archive::{ArchiveStats, archive_name, create_archive};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::FileRecord;
use crate::prune::{PrunePlan, prune};
use crate::replicate::Replicator;
use crate::result::{Operation, RunResult};
use crate::select::{Selection, Selector, cutoff_from, record_access_failure, select_files};
use crate::transport::{RemoteTransport, ScpTransport};

/// Outcome of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Identifier attached to the cycle span.
    pub run_id: Uuid,
    /// Accounting for the work done, complete or partial.
    pub result: RunResult,
    /// `Ok` on completion; cancellation, breaker or configuration error otherwise.
    pub status: FsOpsResult<()>,
    /// Wall time of the cycle.
    pub elapsed: Duration,
}

impl CycleReport {
    /// Whether the cycle ran to completion.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.status.is_ok()
    }

    /// Whether the cycle stopped because of a shutdown request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.status, Err(FsOpsError::Cancelled))
    }
}

/// Backup/prune engine.
#[derive(Clone)]
pub struct BackupService {
    replicator: Replicator,
}

impl Default for BackupService {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupService {
    /// Engine that pushes remote copies with `scp`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ScpTransport::new()))
    }

    /// Engine that pushes remote copies with a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            replicator: Replicator::new(transport),
        }
    }

    /// Run one backup/prune cycle.
    pub async fn run_cycle(
        &self,
        params: &RunParameters,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let run_id = Uuid::new_v4();
        let span = cycle_span(run_id, params.dry_run);
        let started = Instant::now();
        let mut result = RunResult::new();
        let status = self
            .drive(params, cancel, &mut result)
            .instrument(span.clone())
            .await;
        let report = CycleReport {
            run_id,
            result,
            status,
            elapsed: started.elapsed(),
        };
        span.in_scope(|| log_report(&report, params.dry_run));
        report
    }

    async fn drive(
        &self,
        params: &RunParameters,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) -> FsOpsResult<()> {
        ensure_policy(params)?;
        if cancel.is_cancelled() {
            return Err(FsOpsError::Cancelled);
        }

        let cutoff = cutoff_from(SystemTime::now(), params.age_threshold);
        let processed = if params.backup_enabled {
            let effective = prepare_roots(params, result)?;
            let processed = if effective.archive.enabled {
                let reference = Local::now().date_naive();
                self.archive_phase(&effective, cutoff, reference, cancel, result)
                    .await?
            } else {
                self.replicate_phase(&effective, cutoff, cancel, result)
                    .await?
            };
            Some(processed)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return Err(FsOpsError::Cancelled);
        }

        let mut plan = PrunePlan::new(
            &params.target_root,
            cutoff,
            params.error_threshold_percent,
            params.dry_run,
        );
        if let Some(processed) = processed {
            plan = plan.processed_only(processed);
        }
        let worker_cancel = cancel.clone();
        let (pruned, status) = tokio::task::spawn_blocking(move || prune(&plan, &worker_cancel))
            .await
            .map_err(|err| FsOpsError::worker("prune", err))?;
        result.merge(pruned);
        status
    }

    async fn replicate_phase(
        &self,
        params: &RunParameters,
        cutoff: SystemTime,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) -> FsOpsResult<HashSet<PathBuf>> {
        let mut processed = HashSet::new();
        let mut selector = Selector::new(&params.target_root, cutoff);
        loop {
            if cancel.is_cancelled() {
                return Err(FsOpsError::Cancelled);
            }
            let (walker, selection) = next_selection(selector).await?;
            selector = walker;
            let Some(selection) = selection else {
                return Ok(processed);
            };
            match selection {
                Selection::Qualifies(record) => {
                    let replication = self.replicator.replicate(&record, params, cancel).await;
                    let failed = replication.failed();
                    let cancelled = replication.cancelled;
                    result.merge(replication.result);
                    if failed {
                        check_breaker(params, result)?;
                    } else {
                        processed.insert(record.source);
                    }
                    if cancelled {
                        return Err(FsOpsError::Cancelled);
                    }
                }
                Selection::TooNew(_) => result.skipped += 1,
                Selection::Inaccessible { path, error } => {
                    record_access_failure(result, &path, &error);
                }
            }
        }
    }

    async fn archive_phase(
        &self,
        params: &RunParameters,
        cutoff: SystemTime,
        reference: NaiveDate,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) -> FsOpsResult<HashSet<PathBuf>> {
        let records = collect_records(params, cutoff, cancel, result).await?;
        if records.is_empty() {
            info!("no files qualify for archiving");
            return Ok(HashSet::new());
        }

        let files: BTreeMap<PathBuf, String> = records
            .iter()
            .map(|record| (record.source.clone(), record.entry_name()))
            .collect();

        if params.dry_run {
            plan_archive(params, reference, &records);
            account_archived(&records, result);
            result.original_bytes += records.iter().map(|record| record.size).sum::<u64>();
            return Ok(files.into_keys().collect());
        }

        let Some(stats) = build_archives(params, reference, files.clone(), result).await else {
            let attempted = params.local_destinations.len();
            for record in &records {
                let err = FsOpsError::AllDestinationsFailed {
                    path: record.source.clone(),
                    attempted,
                };
                result.add_failure(&record.source, Operation::Archive, &err);
            }
            check_breaker(params, result)?;
            return Ok(HashSet::new());
        };

        account_archived(&records, result);
        result.original_bytes += stats.total_bytes;
        result.compressed_bytes += stats.archive_bytes;
        if result.archive_path.is_none() {
            result.archive_path.clone_from(&stats.path);
            result.archive_size = stats.archive_bytes;
        }
        if let Some(path) = &stats.path {
            let cancelled = self
                .replicator
                .push_to_remotes(path, None, &params.remote_destinations, cancel, result)
                .await;
            if cancelled {
                return Err(FsOpsError::Cancelled);
            }
        }
        Ok(files.into_keys().collect())
    }
}

/// Advance the walk by one entry on a blocking worker.
async fn next_selection(mut selector: Selector) -> FsOpsResult<(Selector, Option<Selection>)> {
    tokio::task::spawn_blocking(move || {
        let selection = selector.next();
        (selector, selection)
    })
    .await
    .map_err(|err| FsOpsError::worker("replicate.walk", err))
}

fn ensure_policy(params: &RunParameters) -> FsOpsResult<()> {
    if params.compression.enabled && params.archive.enabled {
        return Err(FsOpsError::InvalidPolicy {
            field: "archive",
            reason: "archive and compression are mutually exclusive",
            value: None,
        });
    }
    if params.backup_enabled && params.archive.enabled && params.local_destinations.is_empty() {
        return Err(FsOpsError::InvalidPolicy {
            field: "local_destinations",
            reason: "archive mode needs at least one local destination",
            value: None,
        });
    }
    Ok(())
}

/// Create every local root, dropping the ones that cannot be created.
fn prepare_roots(params: &RunParameters, result: &mut RunResult) -> FsOpsResult<RunParameters> {
    let mut effective = params.clone();
    if params.dry_run || params.local_destinations.is_empty() {
        return Ok(effective);
    }

    effective.local_destinations = params
        .local_destinations
        .iter()
        .filter(|root| match std::fs::create_dir_all(root) {
            Ok(()) => true,
            Err(err) => {
                let err = FsOpsError::io("backup.create_root", root.as_path(), err);
                warn!(
                    destination = %root.display(),
                    operation = Operation::Backup.as_str(),
                    error = %err.describe(),
                    "backup destination unavailable"
                );
                result.record_error(root, Operation::Backup, &err);
                false
            }
        })
        .cloned()
        .collect();

    if effective.local_destinations.is_empty() {
        return Err(FsOpsError::InvalidPolicy {
            field: "local_destinations",
            reason: "no backup destination could be created",
            value: Some(
                params
                    .local_destinations
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        });
    }
    Ok(effective)
}

fn check_breaker(params: &RunParameters, result: &RunResult) -> FsOpsResult<()> {
    let threshold = params.error_threshold_percent;
    if threshold <= 0.0 {
        return Ok(());
    }
    let failure_rate = result.failure_rate();
    if failure_rate > threshold {
        error!(
            failure_rate_percent = failure_rate,
            threshold_percent = threshold,
            "backup aborted: error threshold exceeded"
        );
        return Err(FsOpsError::ThresholdExceeded {
            failure_rate,
            threshold,
        });
    }
    Ok(())
}

async fn collect_records(
    params: &RunParameters,
    cutoff: SystemTime,
    cancel: &CancellationToken,
    result: &mut RunResult,
) -> FsOpsResult<Vec<FileRecord>> {
    let root = params.target_root.clone();
    let worker_cancel = cancel.clone();
    let (walked, records, status) = tokio::task::spawn_blocking(move || {
        let mut walked = RunResult::new();
        let mut records = Vec::new();
        let status = select_files(&root, cutoff, &worker_cancel, &mut walked, |record| {
            records.push(record);
        });
        (walked, records, status)
    })
    .await
    .map_err(|err| FsOpsError::worker("archive.collect", err))?;
    result.merge(walked);
    status.map(|()| records)
}

async fn build_archives(
    params: &RunParameters,
    reference: NaiveDate,
    files: BTreeMap<PathBuf, String>,
    result: &mut RunResult,
) -> Option<ArchiveStats> {
    let files = Arc::new(files);
    let policy = params.archive;
    let handles: Vec<_> = params
        .local_destinations
        .iter()
        .map(|root| {
            let files = Arc::clone(&files);
            let destination = root.clone();
            let handle = tokio::task::spawn_blocking(move || {
                create_archive(&files, reference, policy, &destination)
            });
            (root.clone(), handle)
        })
        .collect();

    let mut first = None;
    for (root, handle) in handles {
        let outcome = handle
            .await
            .map_err(|err| FsOpsError::worker("archive.create", err))
            .and_then(|inner| inner);
        match outcome {
            Ok(stats) => {
                if let Some(path) = &stats.path {
                    info!(
                        path = %path.display(),
                        files = stats.files,
                        total_bytes = stats.total_bytes,
                        archive_bytes = stats.archive_bytes,
                        ratio_percent = stats.ratio(),
                        "archive created"
                    );
                }
                if first.is_none() {
                    first = Some(stats);
                }
            }
            Err(err) => {
                warn!(
                    destination = %root.display(),
                    operation = Operation::Archive.as_str(),
                    error = %err.describe(),
                    "archive creation failed"
                );
                result.record_error(&root, Operation::Archive, &err);
            }
        }
    }
    first
}

fn plan_archive(params: &RunParameters, reference: NaiveDate, records: &[FileRecord]) {
    let name = archive_name(&reference, params.archive.group_by, params.archive.format);
    let total_bytes: u64 = records.iter().map(|record| record.size).sum();
    for root in &params.local_destinations {
        info!(
            dry_run = true,
            path = %root.join(&name).display(),
            files = records.len(),
            total_bytes,
            format = params.archive.format.as_str(),
            "dry-run: would create archive"
        );
    }
    for remote in &params.remote_destinations {
        info!(
            dry_run = true,
            archive = %name,
            remote = %remote,
            "dry-run: would copy archive to remote"
        );
    }
}

fn account_archived(records: &[FileRecord], result: &mut RunResult) {
    for record in records {
        result.add_success(record.size);
        result.backed_up += 1;
    }
}

fn log_report(report: &CycleReport, dry_run: bool) {
    let result = &report.result;
    let elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX);
    info!(
        dry_run,
        succeeded = result.succeeded,
        failed = result.failed,
        skipped = result.skipped,
        backed_up = result.backed_up,
        pruned = result.pruned,
        remote_copied = result.remote_copied,
        failure_rate_percent = result.failure_rate(),
        elapsed_ms,
        "{}",
        result.summary()
    );
    match &report.status {
        Ok(()) => {}
        Err(FsOpsError::Cancelled) => warn!("cycle cancelled before completion"),
        Err(err) => error!(error = %err.describe(), "cycle failed"),
    }
}
