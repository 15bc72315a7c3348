//! redraft core library
//!
//! Reward-guided iterative revision of a draft:
//!
//! - `RewardEvaluator`: composite score from similarity, readability and
//!   grammar sub-scorers
//! - `SearchLoop`: greedy rewrite/evaluate/accept cycle over a version store
//! - `Leaderboard`: ranking, diff and score progression of stored versions
//! - `Settings`: layered configuration for the binaries

pub mod config;
pub mod diff;
pub mod domain;
pub mod evaluation_log;
pub mod fakes;
pub mod leaderboard;
pub mod metrics;
pub mod obs;
pub mod oracle;
pub mod progression_log;
pub mod reward;
pub mod search;
pub mod telemetry;

pub use config::Settings;
pub use diff::unified_diff;
pub use domain::{
    round3, Degradation, Evaluation, Result, RevisionError, RewardWeights, SearchStep,
};
pub use evaluation_log::{Decision, EvaluationEntry, EvaluationLog, EvaluationSource};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use oracle::{OllamaOracle, OracleError, RewriteOracle};
pub use progression_log::{ProgressionEntry, ProgressionLog};
pub use reward::{
    FleschReadingEase, GrammarChecker, LanguageToolChecker, OllamaEmbeddingSimilarity,
    ReadabilityScorer, RewardEvaluator, ScorerError, SimilarityScorer,
};
pub use search::{
    Incumbent, IterationOutcome, SearchConfig, SearchLoop, SearchReport, StopReason, StopSignal,
};

pub use redraft_state::{
    RewardRecord, Version, VersionMetadata, VersionOrigin, VersionStore, SEED_VERSION,
};
