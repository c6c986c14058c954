//! Structured observability hooks for the build cycle.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via `CycleSpan`, attached with `tracing::Instrument`
//! - Emission functions for key lifecycle events: start, selection, package outcomes, commit, finish
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! For JSON output, pass `--json` to the binary.

use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

/// Cycle-scoped tracing span.
///
/// Every event logged inside the span carries the cycle id, so logs from
/// successive cycles stay separable. Attach it to the cycle future with
/// [`tracing::Instrument`]; the span closes when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// let span = CycleSpan::new(Path::new("."));
/// run_cycle().instrument(span.span()).await;
/// ```
pub struct CycleSpan {
    cycle_id: String,
    span: tracing::Span,
}

impl CycleSpan {
    /// Create a span tagged with a fresh cycle id and the repository root.
    pub fn new(root: &Path) -> Self {
        let cycle_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "bilt.cycle",
            cycle_id = %cycle_id,
            root = %root.display()
        );
        Self { cycle_id, span }
    }

    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Emit event: cycle started.
pub fn emit_cycle_started(root: &Path, force: bool, dry_run: bool) {
    info!(event = "cycle.started", root = %root.display(), force, dry_run);
}

/// Emit event: final build set computed.
pub fn emit_cycle_selected(build_set: usize, changed: usize) {
    info!(event = "cycle.selected", build_set, changed);
}

/// Emit event: a package built successfully.
pub fn emit_package_built(directory: &str) {
    info!(event = "package.built", package = %directory);
}

/// Emit event: a package failed to build (warning level).
pub fn emit_package_failed(directory: &str, error: &dyn std::fmt::Display) {
    warn!(event = "package.failed", package = %directory, error = %error);
}

/// Emit event: build commit created and pushed.
pub fn emit_cycle_committed(built: usize) {
    info!(event = "cycle.committed", built);
}

/// Emit event: cycle finished with its outcome label and duration.
pub fn emit_cycle_finished(outcome: &str, duration_ms: u64) {
    info!(event = "cycle.finished", outcome = %outcome, duration_ms);
}
