//! Per-file replication to local and remote destinations.
//!
//! # Design
//! - Local destinations run concurrently on blocking workers; the fan-in awaits
//!   them in configuration order, so the first success is deterministic.
//! - Remote pushes start only after every local attempt has finished, and run
//!   one at a time using the first local artifact (post-compression).
//! - Each remote receives the file at `<remote>/<relative path>`, so files sharing a
//!   base name in different directories stay distinct.
//! - Each call returns its own `RunResult` which the orchestrator merges.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use filekeeper_config::{CompressionAlgorithm, CompressionPolicy, RunParameters};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compress::{CompressionStats, compress_file, destination_path};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::FileRecord;
use crate::result::{Operation, RunResult};
use crate::transport::{RemoteTransport, remote_target};

/// Outcome of replicating one file.
#[derive(Debug, Default)]
pub struct Replication {
    /// Local artifacts produced (or that would be produced in dry-run), in destination order.
    pub destinations: Vec<PathBuf>,
    /// Accounting for this file.
    pub result: RunResult,
    /// Cancellation was observed before every remote destination was attempted.
    pub cancelled: bool,
}

impl Replication {
    /// Whether the file counts as failed (every local destination failed).
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.result.failed > 0
    }
}

/// Copies qualifying files to every configured destination.
#[derive(Clone)]
pub struct Replicator {
    transport: Arc<dyn RemoteTransport>,
}

impl Replicator {
    /// Build a replicator that pushes remote copies through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }

    /// Replicate `record` according to `params`.
    pub async fn replicate(
        &self,
        record: &FileRecord,
        params: &RunParameters,
        cancel: &CancellationToken,
    ) -> Replication {
        if params.dry_run {
            return Self::plan(record, params);
        }

        let mut replication = Replication::default();
        let attempted = params.local_destinations.len();
        let mut first: Option<CompressionStats> = None;

        for (root, joined) in spawn_local_copies(record, params).await {
            match joined {
                Ok(stats) => {
                    log_local_success(record, &stats);
                    replication.destinations.push(stats.destination.clone());
                    if first.is_none() {
                        first = Some(stats);
                    }
                }
                Err(err) => {
                    let destination = record.destination_under(&root);
                    warn!(
                        source = %record.source.display(),
                        destination = %destination.display(),
                        operation = Operation::Backup.as_str(),
                        error = %err.describe(),
                        "backup to destination failed"
                    );
                    replication
                        .result
                        .record_error(&destination, Operation::Backup, &err);
                }
            }
        }

        if attempted > 0 && first.is_none() {
            let err = FsOpsError::AllDestinationsFailed {
                path: record.source.clone(),
                attempted,
            };
            warn!(
                source = %record.source.display(),
                attempted,
                "backup failed on every destination"
            );
            replication
                .result
                .add_failure(&record.source, Operation::Backup, &err);
            return replication;
        }

        replication.result.add_success(record.size);
        match &first {
            Some(stats) => {
                replication.result.backed_up += 1;
                replication.result.original_bytes += stats.original_bytes;
                replication.result.compressed_bytes += stats.compressed_bytes;
            }
            None => {
                replication.result.original_bytes += record.size;
                replication.result.compressed_bytes += record.size;
            }
        }

        let artifact = first
            .as_ref()
            .map_or(record.source.as_path(), |stats| stats.destination.as_path());
        let relative = remote_relative(record, params, first.is_some());
        let before = replication.result.remote_copied;
        replication.cancelled = self
            .push_to_remotes(
                artifact,
                Some(&relative),
                &params.remote_destinations,
                cancel,
                &mut replication.result,
            )
            .await;
        if first.is_none() && replication.result.remote_copied > before {
            replication.result.backed_up += 1;
        }
        replication
    }

    /// Push `artifact` to each remote in order, recording successes and failures
    /// in `result`. With `relative`, each copy targets that path beneath the
    /// remote root; without it, the remote string is used as given.
    /// Returns `true` if cancellation cut the sequence short.
    pub(crate) async fn push_to_remotes(
        &self,
        artifact: &Path,
        relative: Option<&str>,
        remotes: &[String],
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) -> bool {
        for remote in remotes {
            if cancel.is_cancelled() {
                debug!(remote = %remote, "remote copies skipped after cancellation");
                return true;
            }
            let target =
                relative.map_or_else(|| remote.clone(), |name| remote_target(remote, name));
            match self.transport.copy(artifact, &target).await {
                Ok(()) => {
                    result.remote_copied += 1;
                    info!(
                        source = %artifact.display(),
                        remote = %target,
                        "remote copy complete"
                    );
                }
                Err(err) => {
                    warn!(
                        source = %artifact.display(),
                        remote = %target,
                        operation = Operation::Remote.as_str(),
                        error = %err.describe(),
                        "remote copy failed"
                    );
                    result.record_error(artifact, Operation::Remote, &err);
                }
            }
        }
        false
    }

    fn plan(record: &FileRecord, params: &RunParameters) -> Replication {
        let mut replication = Replication::default();
        for root in &params.local_destinations {
            let destination = destination_path(&record.destination_under(root), params.compression);
            info!(
                dry_run = true,
                source = %record.source.display(),
                destination = %destination.display(),
                size_bytes = record.size,
                algorithm = params.compression.effective_algorithm().as_str(),
                "dry-run: would back up file"
            );
            replication.destinations.push(destination);
        }
        let artifact = replication
            .destinations
            .first()
            .map_or(record.source.as_path(), PathBuf::as_path);
        let relative = remote_relative(record, params, !params.local_destinations.is_empty());
        for remote in &params.remote_destinations {
            info!(
                dry_run = true,
                source = %artifact.display(),
                remote = %remote_target(remote, &relative),
                "dry-run: would copy to remote"
            );
        }
        replication.result.add_success(record.size);
        if !params.local_destinations.is_empty() || !params.remote_destinations.is_empty() {
            replication.result.backed_up += 1;
        }
        replication
    }
}

/// Relative remote path for `record`; carries the compression suffix when the
/// pushed artifact is a local (possibly compressed) copy rather than the source.
fn remote_relative(record: &FileRecord, params: &RunParameters, from_local: bool) -> String {
    let mut relative = record.entry_name();
    if from_local {
        relative.push_str(params.compression.effective_algorithm().extension());
    }
    relative
}

type LocalAttempt = (PathBuf, FsOpsResult<CompressionStats>);

async fn spawn_local_copies(record: &FileRecord, params: &RunParameters) -> Vec<LocalAttempt> {
    let handles: Vec<(PathBuf, JoinHandle<FsOpsResult<CompressionStats>>)> = params
        .local_destinations
        .iter()
        .map(|root| {
            let source = record.source.clone();
            let destination = record.destination_under(root);
            let policy = params.compression;
            let handle =
                tokio::task::spawn_blocking(move || copy_to(&source, &destination, policy));
            (root.clone(), handle)
        })
        .collect();

    let mut attempts = Vec::with_capacity(handles.len());
    for (root, handle) in handles {
        let outcome = handle
            .await
            .map_err(|err| FsOpsError::worker("replicate.local_copy", err))
            .and_then(|inner| inner);
        attempts.push((root, outcome));
    }
    attempts
}

fn copy_to(source: &Path, destination: &Path, policy: CompressionPolicy) -> FsOpsResult<CompressionStats> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| FsOpsError::io("replicate.create_parent", parent, err))?;
    }
    compress_file(source, destination, policy)
}

fn log_local_success(record: &FileRecord, stats: &CompressionStats) {
    let duration_ms = u64::try_from(stats.duration.as_millis()).unwrap_or(u64::MAX);
    if stats.algorithm == CompressionAlgorithm::None {
        info!(
            source = %record.source.display(),
            destination = %stats.destination.display(),
            size_bytes = stats.original_bytes,
            duration_ms,
            "file backed up"
        );
    } else {
        info!(
            source = %record.source.display(),
            destination = %stats.destination.display(),
            size_bytes = stats.original_bytes,
            duration_ms,
            original_bytes = stats.original_bytes,
            compressed_bytes = stats.compressed_bytes,
            ratio_percent = stats.ratio(),
            algorithm = stats.algorithm.as_str(),
            "file backed up with compression"
        );
    }
}
