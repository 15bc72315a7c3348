//! Greedy reward-guided revision search.
//!
//! Each iteration asks the oracle for one rewrite of the incumbent, scores
//! it, and keeps it only when it strictly beats the incumbent. Accepted
//! rewrites are appended to the corpus with their reward record attached and
//! recorded in the progression log. Every scored candidate, accepted or not,
//! can also be written to the evaluation log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use redraft_state::{StorageError, Version, VersionMetadata, VersionOrigin, VersionStore};
use serde::Serialize;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::domain::{Degradation, Evaluation, Result, RevisionError, SearchStep};
use crate::evaluation_log::{Decision, EvaluationEntry, EvaluationLog};
use crate::metrics::METRICS;
use crate::obs;
use crate::oracle::{OracleError, RewriteOracle, DEFAULT_ORACLE_TIMEOUT};
use crate::progression_log::{ProgressionEntry, ProgressionLog};
use crate::reward::RewardEvaluator;

/// Draft seeded into an empty corpus when none is configured.
pub const DEFAULT_INITIAL_DRAFT: &str =
    "This is the initial draft text. Replace it with your actual text.";

/// Default number of iterations per run.
pub const DEFAULT_ITERATIONS: usize = 5;

/// Parameters of one search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of rewrite attempts
    pub iterations: usize,
    /// Stop after this many consecutive iterations without an acceptance
    pub patience: Option<usize>,
    /// Upper bound on a single oracle call
    pub oracle_timeout: Duration,
    /// Text seeded as version 0 when the corpus is empty
    pub initial_draft: String,
    /// Reference for the similarity component
    pub reference_text: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            patience: None,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            initial_draft: DEFAULT_INITIAL_DRAFT.to_string(),
            reference_text: None,
        }
    }
}

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Current best draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incumbent {
    pub version: u64,
    pub content: String,
    pub evaluation: Evaluation,
}

impl Incumbent {
    pub fn score(&self) -> f64 {
        self.evaluation.score()
    }
}

/// What happened in one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IterationOutcome {
    Accepted {
        iteration: usize,
        version: u64,
        previous_score: f64,
        score: f64,
        degraded: Degradation,
    },
    Rejected {
        iteration: usize,
        incumbent_score: f64,
        candidate_score: f64,
        degraded: Degradation,
    },
    /// The oracle produced no usable candidate
    Failed { iteration: usize, reason: String },
}

impl IterationOutcome {
    pub fn iteration(&self) -> usize {
        match self {
            IterationOutcome::Accepted { iteration, .. }
            | IterationOutcome::Rejected { iteration, .. }
            | IterationOutcome::Failed { iteration, .. } => *iteration,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, IterationOutcome::Accepted { .. })
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All configured iterations ran
    Completed,
    /// Too many consecutive iterations without improvement
    Patience,
    /// The stop signal was raised
    Stopped,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Patience => "patience",
            StopReason::Stopped => "stopped",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub run_id: String,
    /// Whether the corpus was empty and the initial draft was seeded
    pub seeded: bool,
    pub initial_version: u64,
    pub initial_score: f64,
    pub outcomes: Vec<IterationOutcome>,
    pub best: Incumbent,
    pub stop_reason: StopReason,
    pub duration_ms: u64,
}

impl SearchReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IterationOutcome::Rejected { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IterationOutcome::Failed { .. }))
            .count()
    }
}

/// Drives the rewrite/evaluate/accept cycle over a version store.
pub struct SearchLoop {
    store: Arc<dyn VersionStore>,
    oracle: Arc<dyn RewriteOracle>,
    evaluator: RewardEvaluator,
    config: SearchConfig,
    progression: Option<ProgressionLog>,
    evaluations: Option<EvaluationLog>,
    stop: StopSignal,
}

impl SearchLoop {
    pub fn new(
        store: Arc<dyn VersionStore>,
        oracle: Arc<dyn RewriteOracle>,
        evaluator: RewardEvaluator,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            evaluator,
            config,
            progression: None,
            evaluations: None,
            stop: StopSignal::new(),
        }
    }

    pub fn with_progression_log(mut self, log: ProgressionLog) -> Self {
        self.progression = Some(log);
        self
    }

    pub fn with_evaluation_log(mut self, log: EvaluationLog) -> Self {
        self.evaluations = Some(log);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops the run before its next iteration.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn reference(&self) -> Option<&str> {
        self.config.reference_text.as_deref()
    }

    /// Establish the incumbent: seed an empty corpus, otherwise re-score the
    /// highest-numbered version. Returns the incumbent and whether seeding
    /// happened.
    pub async fn init(&self) -> Result<(Incumbent, bool)> {
        if let Some(latest) = self.load_latest().await? {
            return Ok((self.rescore(latest).await?, false));
        }

        match self.seed().await {
            Ok(incumbent) => Ok((incumbent, true)),
            Err(RevisionError::CorpusNotEmpty) => {
                // Another writer filled the corpus between the read and the seed.
                debug!("corpus seeded concurrently, loading its latest version");
                let latest = self.load_latest().await?.ok_or_else(|| {
                    RevisionError::Storage(StorageError::Backend(
                        "corpus emptied while seeding".to_string(),
                    ))
                    .at(0, SearchStep::LoadCorpus)
                })?;
                Ok((self.rescore(latest).await?, false))
            }
            Err(e) => Err(e.at(0, SearchStep::Seed)),
        }
    }

    async fn load_latest(&self) -> Result<Option<Version>> {
        self.store
            .latest()
            .await
            .map_err(|e| RevisionError::from(e).at(0, SearchStep::LoadCorpus))
    }

    async fn rescore(&self, latest: Version) -> Result<Incumbent> {
        let evaluation = self
            .evaluator
            .evaluate(&latest.content, self.reference())
            .await
            .map_err(|e| e.at(0, SearchStep::EvaluateIncumbent))?;
        debug!(version = latest.version_number, score = evaluation.score(), "incumbent loaded");
        Ok(Incumbent {
            version: latest.version_number,
            content: latest.content,
            evaluation,
        })
    }

    /// Score the initial draft and store it as the seed version. Losing the
    /// seed to a concurrent writer surfaces as `CorpusNotEmpty`.
    async fn seed(&self) -> Result<Incumbent> {
        let content = self.config.initial_draft.clone();
        let evaluation = self.evaluator.evaluate(&content, self.reference()).await?;
        let metadata = VersionMetadata::new(VersionOrigin::Seed).with_reward(evaluation.record);
        let version = self.store.seed(&content, metadata).await?;
        obs::emit_corpus_seeded(version, evaluation.score());
        Ok(Incumbent {
            version,
            content,
            evaluation,
        })
    }

    /// Run the configured number of iterations.
    pub async fn run(&self) -> Result<SearchReport> {
        let run_id = Uuid::new_v4().to_string();
        self.run_inner(run_id.clone())
            .instrument(obs::search_span(&run_id))
            .await
    }

    async fn run_inner(&self, run_id: String) -> Result<SearchReport> {
        let started = Instant::now();
        let (mut incumbent, seeded) = self.init().await?;
        let initial_version = incumbent.version;
        let initial_score = incumbent.score();
        obs::emit_search_started(
            &run_id,
            self.config.iterations,
            initial_version,
            initial_score,
        );

        let mut outcomes = Vec::with_capacity(self.config.iterations);
        let mut stale = 0usize;
        let mut stop_reason = StopReason::Completed;

        for iteration in 1..=self.config.iterations {
            if self.stop.is_stopped() {
                stop_reason = StopReason::Stopped;
                break;
            }

            let outcome = self.iterate(&run_id, iteration, &mut incumbent).await?;
            if outcome.is_accepted() {
                stale = 0;
            } else {
                stale += 1;
            }
            outcomes.push(outcome);

            if let Some(patience) = self.config.patience {
                if stale >= patience && iteration < self.config.iterations {
                    stop_reason = StopReason::Patience;
                    break;
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        METRICS.flush();
        obs::emit_search_finished(
            &run_id,
            duration_ms,
            accepted,
            incumbent.version,
            incumbent.score(),
            stop_reason.as_str(),
        );

        Ok(SearchReport {
            run_id,
            seeded,
            initial_version,
            initial_score,
            outcomes,
            best: incumbent,
            stop_reason,
            duration_ms,
        })
    }

    async fn iterate(
        &self,
        run_id: &str,
        iteration: usize,
        incumbent: &mut Incumbent,
    ) -> Result<IterationOutcome> {
        METRICS.inc_iterations();

        let candidate = match self.request_rewrite(&incumbent.content).await {
            Ok(candidate) => candidate,
            Err(e) => {
                METRICS.inc_oracle_failures();
                obs::emit_iteration_failed(iteration, &e);
                return Ok(IterationOutcome::Failed {
                    iteration,
                    reason: e.to_string(),
                });
            }
        };

        let evaluation = match self.evaluator.evaluate(&candidate, self.reference()).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                obs::emit_iteration_failed(iteration, &e);
                return Ok(IterationOutcome::Failed {
                    iteration,
                    reason: e.to_string(),
                });
            }
        };
        obs::emit_candidate_evaluated(iteration, evaluation.score(), &evaluation.degraded.names());

        let previous_score = incumbent.score();
        if evaluation.score() <= previous_score {
            METRICS.inc_rejected();
            obs::emit_candidate_rejected(iteration, previous_score, evaluation.score());
            self.audit(EvaluationEntry::candidate(
                run_id,
                iteration,
                &candidate,
                self.reference(),
                &evaluation,
                Decision::Rejected,
            ))
            .await;
            return Ok(IterationOutcome::Rejected {
                iteration,
                incumbent_score: previous_score,
                candidate_score: evaluation.score(),
                degraded: evaluation.degraded,
            });
        }

        let metadata = VersionMetadata::new(VersionOrigin::Search)
            .with_reward(evaluation.record)
            .with_note(format!("run {run_id} iteration {iteration}"));
        let version = self
            .store
            .append(&candidate, metadata)
            .await
            .map_err(|e| RevisionError::from(e).at(iteration, SearchStep::PersistAccepted))?;

        if let Some(log) = &self.progression {
            let entry = ProgressionEntry::new(version, evaluation.record);
            if let Err(e) = log.append(&entry).await {
                warn!(version, error = %e, path = %log.path().display(), "failed to write progression line");
            }
        }

        METRICS.inc_accepted();
        obs::emit_candidate_accepted(iteration, version, previous_score, evaluation.score());
        self.audit(
            EvaluationEntry::candidate(
                run_id,
                iteration,
                &candidate,
                self.reference(),
                &evaluation,
                Decision::Accepted,
            )
            .with_version(version),
        )
        .await;

        *incumbent = Incumbent {
            version,
            content: candidate,
            evaluation,
        };
        Ok(IterationOutcome::Accepted {
            iteration,
            version,
            previous_score,
            score: evaluation.score(),
            degraded: evaluation.degraded,
        })
    }

    /// Record a scored candidate. Write failures are logged, never raised.
    async fn audit(&self, entry: EvaluationEntry) {
        if let Some(log) = &self.evaluations {
            if let Err(e) = log.append(&entry).await {
                warn!(error = %e, path = %log.path().display(), "failed to write evaluation entry");
            }
        }
    }

    async fn request_rewrite(&self, text: &str) -> std::result::Result<String, OracleError> {
        let limit = self.config.oracle_timeout;
        let candidate = tokio::time::timeout(limit, self.oracle.rewrite(text))
            .await
            .map_err(|_| OracleError::Timeout(limit))??;
        if candidate.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_five_iterations() {
        let config = SearchConfig::default();
        assert_eq!(config.iterations, 5);
        assert_eq!(config.oracle_timeout, Duration::from_secs(120));
        assert!(config.patience.is_none());
        assert!(config.reference_text.is_none());
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_stopped());
        handle.stop();
        assert!(signal.is_stopped());
    }

    #[test]
    fn outcome_reports_its_iteration() {
        let outcome = IterationOutcome::Failed {
            iteration: 4,
            reason: "timeout".to_string(),
        };
        assert_eq!(outcome.iteration(), 4);
        assert!(!outcome.is_accepted());
    }
}
