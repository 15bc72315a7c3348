//! Reward weights and evaluation results.

use redraft_state::RewardRecord;
use serde::{Deserialize, Serialize};

/// Weights of the composite reward:
/// `score = similarity * w_sim + readability * w_read - errors * w_err`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub similarity: f64,
    pub readability: f64,
    pub errors: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            similarity: 0.9,
            readability: 0.9,
            errors: 0.3,
        }
    }
}

impl RewardWeights {
    /// Combine already-rounded components into a rounded score.
    pub fn combine(&self, similarity: f64, readability: f64, errors: u32) -> f64 {
        round3(
            similarity * self.similarity + readability * self.readability
                - f64::from(errors) * self.errors,
        )
    }
}

/// Round to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Which sub-scorers fell back to their default value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub similarity: bool,
    pub readability: bool,
    pub grammar: bool,
}

impl Degradation {
    /// True when any sub-scorer was replaced by its default.
    pub fn any(&self) -> bool {
        self.similarity || self.readability || self.grammar
    }

    /// Names of the degraded sub-scorers, for logs.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.similarity {
            names.push("similarity");
        }
        if self.readability {
            names.push("readability");
        }
        if self.grammar {
            names.push("grammar");
        }
        names
    }
}

/// Result of one evaluator call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub record: RewardRecord,
    pub degraded: Degradation,
}

impl Evaluation {
    pub fn score(&self) -> f64 {
        self.record.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_reference_tuning() {
        let w = RewardWeights::default();
        assert_eq!((w.similarity, w.readability, w.errors), (0.9, 0.9, 0.3));
    }

    #[test]
    fn combine_subtracts_weighted_errors() {
        let w = RewardWeights::default();
        // 0.8*0.9 + 60*0.9 - 2*0.3 = 0.72 + 54 - 0.6
        assert_eq!(w.combine(0.8, 60.0, 2), 54.12);
    }

    #[test]
    fn round3_is_stable() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-0.0004), -0.0);
        assert_eq!(round3(round3(7.77777)), round3(7.77777));
    }

    #[test]
    fn degradation_lists_fallen_back_scorers() {
        let d = Degradation {
            grammar: true,
            ..Default::default()
        };
        assert!(d.any());
        assert_eq!(d.names(), vec!["grammar"]);
        assert!(!Degradation::default().any());
    }
}
