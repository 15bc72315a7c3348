//! Composite reward evaluation.
//!
//! [`RewardEvaluator`] combines three pluggable sub-scorers into a single
//! [`RewardRecord`]. A failing sub-scorer never aborts evaluation: its
//! component falls back to zero and the fallback is reported through
//! [`Degradation`].

pub mod embedding;
pub mod languagetool;
pub mod readability;
pub mod scorers;

use std::sync::Arc;

use redraft_state::RewardRecord;
use tracing::debug;

use crate::domain::{round3, Degradation, Evaluation, Result, RevisionError, RewardWeights};
use crate::metrics::METRICS;
use crate::obs::emit_scorer_degraded;

pub use embedding::{cosine_similarity, OllamaEmbeddingSimilarity};
pub use languagetool::LanguageToolChecker;
pub use readability::FleschReadingEase;
pub use scorers::{GrammarChecker, ReadabilityScorer, ScorerError, SimilarityScorer};

/// Scores drafts with
/// `similarity * w_sim + readability * w_read - errors * w_err`.
#[derive(Clone)]
pub struct RewardEvaluator {
    similarity: Arc<dyn SimilarityScorer>,
    readability: Arc<dyn ReadabilityScorer>,
    grammar: Arc<dyn GrammarChecker>,
    weights: RewardWeights,
}

impl RewardEvaluator {
    /// Build an evaluator with the default weights.
    pub fn new(
        similarity: Arc<dyn SimilarityScorer>,
        readability: Arc<dyn ReadabilityScorer>,
        grammar: Arc<dyn GrammarChecker>,
    ) -> Self {
        Self {
            similarity,
            readability,
            grammar,
            weights: RewardWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: RewardWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> RewardWeights {
        self.weights
    }

    /// Score `text`, optionally against a reference text.
    ///
    /// Blank `text` is rejected with [`RevisionError::EmptyText`]. A missing
    /// or blank reference yields `similarity = 0.0` without degradation.
    pub async fn evaluate(&self, text: &str, reference: Option<&str>) -> Result<Evaluation> {
        if text.trim().is_empty() {
            return Err(RevisionError::EmptyText);
        }

        let mut degraded = Degradation::default();

        let similarity = match reference.filter(|r| !r.trim().is_empty()) {
            None => 0.0,
            Some(reference) => {
                let raw = self.similarity.similarity(text, reference).await;
                fallback("similarity", raw, &mut degraded.similarity)
            }
        };

        let readability = fallback(
            "readability",
            self.readability.readability(text).await,
            &mut degraded.readability,
        );

        let errors = match self.grammar.check(text).await {
            Ok(count) => count,
            Err(e) => {
                emit_scorer_degraded("grammar", &e);
                degraded.grammar = true;
                0
            }
        };

        if degraded.any() {
            METRICS.inc_degraded();
        }

        let similarity = round3(similarity);
        let readability = round3(readability);
        let record = RewardRecord {
            similarity,
            readability,
            errors,
            score: self.weights.combine(similarity, readability, errors),
        };
        debug!(
            score = record.score,
            similarity = record.similarity,
            readability = record.readability,
            errors = record.errors,
            "draft evaluated"
        );

        Ok(Evaluation { record, degraded })
    }
}

/// Unwrap a float component, degrading errors and non-finite values to 0.
fn fallback(
    component: &'static str,
    raw: std::result::Result<f64, ScorerError>,
    flag: &mut bool,
) -> f64 {
    match raw {
        Ok(value) if value.is_finite() => value,
        Ok(value) => {
            emit_scorer_degraded(component, &format!("non-finite value {value}"));
            *flag = true;
            0.0
        }
        Err(e) => {
            emit_scorer_degraded(component, &e);
            *flag = true;
            0.0
        }
    }
}
