//! Span helpers for the service process and individual cycles.
//!
//! # Design
//! - An application-level span carries mode and version for the process lifetime.
//! - Each backup/prune cycle gets its own span keyed by a fresh run identifier.

use tracing::{Span, span::Entered};
use uuid::Uuid;

use crate::init::build_version;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, version = %build_version()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Build the span that wraps one backup/prune cycle.
#[must_use]
pub fn cycle_span(run_id: Uuid, dry_run: bool) -> Span {
    tracing::info_span!("cycle", run_id = %run_id, dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_and_spans_can_be_constructed() {
        let _guard = GlobalContextGuard::new("test");
        let span = cycle_span(Uuid::new_v4(), true);
        let _entered = span.enter();
    }
}
