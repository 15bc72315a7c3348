//! Scripted scorers and oracles (testing only)
//!
//! These fakes let the evaluator, search loop and leaderboard be exercised
//! without any model server. Scores can be fixed, looked up per text, or
//! made to fail.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::oracle::{OracleError, RewriteOracle};
use crate::reward::scorers::{GrammarChecker, ReadabilityScorer, ScorerError, SimilarityScorer};

/// Similarity scorer that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedSimilarity(pub f64);

#[async_trait]
impl SimilarityScorer for FixedSimilarity {
    async fn similarity(&self, _text: &str, _reference: &str) -> Result<f64, ScorerError> {
        Ok(self.0)
    }
}

/// Readability scorer that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedReadability(pub f64);

#[async_trait]
impl ReadabilityScorer for FixedReadability {
    async fn readability(&self, _text: &str) -> Result<f64, ScorerError> {
        Ok(self.0)
    }
}

/// Grammar checker that always reports the same error count.
#[derive(Debug, Clone, Copy)]
pub struct FixedGrammar(pub u32);

#[async_trait]
impl GrammarChecker for FixedGrammar {
    async fn check(&self, _text: &str) -> Result<u32, ScorerError> {
        Ok(self.0)
    }
}

/// Fails every call of every scorer contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingScorer;

fn offline() -> ScorerError {
    ScorerError::Unavailable("scorer offline".to_string())
}

#[async_trait]
impl SimilarityScorer for FailingScorer {
    async fn similarity(&self, _text: &str, _reference: &str) -> Result<f64, ScorerError> {
        Err(offline())
    }
}

#[async_trait]
impl ReadabilityScorer for FailingScorer {
    async fn readability(&self, _text: &str) -> Result<f64, ScorerError> {
        Err(offline())
    }
}

#[async_trait]
impl GrammarChecker for FailingScorer {
    async fn check(&self, _text: &str) -> Result<u32, ScorerError> {
        Err(offline())
    }
}

/// Readability looked up by exact text; unknown texts fail.
///
/// With weights `{similarity: 0, readability: 1, errors: 0}` the composite
/// score equals the table value, which makes search scenarios easy to script.
#[derive(Debug, Default)]
pub struct TableReadability {
    scores: HashMap<String, f64>,
}

impl TableReadability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, score: f64) -> Self {
        self.scores.insert(text.into(), score);
        self
    }
}

#[async_trait]
impl ReadabilityScorer for TableReadability {
    async fn readability(&self, text: &str) -> Result<f64, ScorerError> {
        self.scores
            .get(text)
            .copied()
            .ok_or_else(|| ScorerError::Unscorable(format!("no scripted score for {text:?}")))
    }
}

/// Grammar checker that fails for listed texts and reports a fixed count
/// for everything else.
#[derive(Debug, Default)]
pub struct SelectiveGrammar {
    failing: Vec<String>,
    errors: u32,
}

impl SelectiveGrammar {
    pub fn new(errors: u32) -> Self {
        Self {
            failing: Vec::new(),
            errors,
        }
    }

    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.push(text.into());
        self
    }
}

#[async_trait]
impl GrammarChecker for SelectiveGrammar {
    async fn check(&self, text: &str) -> Result<u32, ScorerError> {
        if self.failing.iter().any(|t| t == text) {
            return Err(offline());
        }
        Ok(self.errors)
    }
}

/// Oracle that replays a fixed script of responses, then fails.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script from a list of successful rewrites.
    pub fn rewrites<I, S>(rewrites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let oracle = Self::new();
        for r in rewrites {
            oracle.push_ok(r);
        }
        oracle
    }

    pub fn push_ok(&self, rewrite: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(rewrite.into()));
    }

    pub fn push_err(&self, err: OracleError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewriteOracle for ScriptedOracle {
    async fn rewrite(&self, _text: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".to_string())))
    }
}
