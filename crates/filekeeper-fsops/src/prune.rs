//! Deletion of qualifying files from the target tree.
//!
//! # Design
//! - Same walk as selection: inaccessible entries never stop the pass.
//! - After a backup phase only files that phase processed are eligible; anything
//!   else that qualifies is retained.
//! - The breaker compares prune failures against this pass's own attempts.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::model::FileRecord;
use crate::result::{Operation, RunResult, percentage};
use crate::select::{Selection, Selector, record_access_failure};

/// Which qualifying files a prune pass may delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneScope {
    /// Every qualifying file; the pass also accounts skips and access errors.
    All,
    /// Only the listed source paths, processed by a preceding backup phase that
    /// already accounted skips and access errors.
    Processed(HashSet<PathBuf>),
}

/// Inputs for one prune pass.
#[derive(Debug, Clone)]
pub struct PrunePlan {
    /// Root of the tree to prune.
    pub root: PathBuf,
    /// Files modified strictly before this instant qualify.
    pub cutoff: SystemTime,
    /// Breaker threshold in percent; `0` disables it.
    pub error_threshold_percent: f64,
    /// Account deletions without performing them.
    pub dry_run: bool,
    /// Files the pass may delete.
    pub scope: PruneScope,
}

impl PrunePlan {
    /// Plan that prunes every qualifying file under `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        cutoff: SystemTime,
        error_threshold_percent: f64,
        dry_run: bool,
    ) -> Self {
        Self {
            root: root.into(),
            cutoff,
            error_threshold_percent,
            dry_run,
            scope: PruneScope::All,
        }
    }

    /// Restrict the pass to files processed by a backup phase.
    #[must_use]
    pub fn processed_only(mut self, processed: HashSet<PathBuf>) -> Self {
        self.scope = PruneScope::Processed(processed);
        self
    }

    const fn accounts_walk(&self) -> bool {
        matches!(self.scope, PruneScope::All)
    }

    fn eligible(&self, path: &Path) -> bool {
        match &self.scope {
            PruneScope::All => true,
            PruneScope::Processed(processed) => processed.contains(path),
        }
    }
}

/// Run one prune pass.
///
/// The returned result is always populated with the work done so far; the
/// status is an error only for cancellation or a tripped breaker.
pub fn prune(plan: &PrunePlan, cancel: &CancellationToken) -> (RunResult, FsOpsResult<()>) {
    prune_with(plan, cancel, remove_from_disk)
}

/// Run one prune pass with a custom deletion primitive.
pub fn prune_with<F>(
    plan: &PrunePlan,
    cancel: &CancellationToken,
    mut delete: F,
) -> (RunResult, FsOpsResult<()>)
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut result = RunResult::new();
    let status = prune_into(plan, cancel, &mut delete, &mut result);
    (result, status)
}

fn remove_from_disk(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

fn prune_into<F>(
    plan: &PrunePlan,
    cancel: &CancellationToken,
    delete: &mut F,
    result: &mut RunResult,
) -> FsOpsResult<()>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut selector = Selector::new(&plan.root, plan.cutoff);
    loop {
        if cancel.is_cancelled() {
            return Err(FsOpsError::Cancelled);
        }
        let Some(selection) = selector.next() else {
            return Ok(());
        };
        match selection {
            Selection::Qualifies(record) if plan.eligible(&record.source) => {
                remove(plan, &record, delete, result)?;
            }
            Selection::Qualifies(record) => {
                debug!(path = %record.source.display(), "file retained");
            }
            Selection::TooNew(_) if plan.accounts_walk() => result.skipped += 1,
            Selection::TooNew(_) => {}
            Selection::Inaccessible { path, error } if plan.accounts_walk() => {
                record_access_failure(result, &path, &error);
            }
            Selection::Inaccessible { path, .. } => {
                debug!(path = %path.display(), "inaccessible entry already reported");
            }
        }
    }
}

fn remove<F>(
    plan: &PrunePlan,
    record: &FileRecord,
    delete: &mut F,
    result: &mut RunResult,
) -> FsOpsResult<()>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    if plan.dry_run {
        info!(
            dry_run = true,
            path = %record.source.display(),
            size_bytes = record.size,
            "dry-run: would prune file"
        );
        result.pruned += 1;
        return Ok(());
    }

    match delete(&record.source) {
        Ok(()) => {
            info!(
                path = %record.source.display(),
                size_bytes = record.size,
                "file pruned"
            );
            result.pruned += 1;
            Ok(())
        }
        Err(err) => {
            let err = FsOpsError::io("prune.remove", &record.source, err);
            warn!(
                path = %record.source.display(),
                operation = Operation::Prune.as_str(),
                error = %err.describe(),
                "prune failed"
            );
            result.add_failure(&record.source, Operation::Prune, &err);
            check_threshold(plan.error_threshold_percent, result)
        }
    }
}

fn check_threshold(threshold: f64, result: &RunResult) -> FsOpsResult<()> {
    if threshold <= 0.0 {
        return Ok(());
    }
    let failure_rate = percentage(result.failed, result.pruned + result.failed);
    if failure_rate > threshold {
        warn!(
            failure_rate_percent = failure_rate,
            threshold_percent = threshold,
            "prune aborted: error threshold exceeded"
        );
        return Err(FsOpsError::ThresholdExceeded {
            failure_rate,
            threshold,
        });
    }
    Ok(())
}
