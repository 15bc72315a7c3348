//! Structured observability hooks for search runs.
//!
//! - `search_span`: run-scoped span that tags everything logged during a
//!   run with its `run_id`
//! - `emit_*`: one structured event per lifecycle step
//!
//! Events are emitted at `info!`, degraded scorers and failed iterations at
//! `warn!`. Use `RUST_LOG` to filter and `--json` for JSON output.

use tracing::{info, warn};

/// Span for one search run. Attach it to the run future with
/// `tracing::Instrument` so it stays entered across awaits.
///
/// ```ignore
/// search.run_inner().instrument(search_span(&run_id)).await
/// ```
pub fn search_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("redraft.search", run_id = %run_id)
}

pub fn emit_search_started(run_id: &str, iterations: usize, incumbent_version: u64, score: f64) {
    info!(
        event = "search.started",
        run_id = %run_id,
        iterations = iterations,
        incumbent_version = incumbent_version,
        incumbent_score = score,
    );
}

pub fn emit_corpus_seeded(version: u64, score: f64) {
    info!(event = "corpus.seeded", version = version, score = score);
}

pub fn emit_candidate_evaluated(iteration: usize, score: f64, degraded: &[&str]) {
    info!(
        event = "candidate.evaluated",
        iteration = iteration,
        score = score,
        degraded = ?degraded,
    );
}

pub fn emit_candidate_accepted(iteration: usize, version: u64, previous: f64, score: f64) {
    info!(
        event = "candidate.accepted",
        iteration = iteration,
        version = version,
        previous_score = previous,
        score = score,
    );
}

pub fn emit_candidate_rejected(iteration: usize, incumbent: f64, candidate: f64) {
    info!(
        event = "candidate.rejected",
        iteration = iteration,
        incumbent_score = incumbent,
        candidate_score = candidate,
    );
}

/// Warning: an iteration produced no candidate.
pub fn emit_iteration_failed(iteration: usize, error: &dyn std::fmt::Display) {
    warn!(event = "iteration.failed", iteration = iteration, error = %error);
}

/// Warning: a sub-scorer failed and its component fell back to the default.
pub fn emit_scorer_degraded(component: &str, error: &dyn std::fmt::Display) {
    warn!(event = "scorer.degraded", component = %component, error = %error);
}

pub fn emit_search_finished(
    run_id: &str,
    duration_ms: u64,
    accepted: usize,
    best_version: u64,
    best_score: f64,
    stop_reason: &str,
) {
    info!(
        event = "search.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        accepted = accepted,
        best_version = best_version,
        best_score = best_score,
        stop_reason = %stop_reason,
    );
}
