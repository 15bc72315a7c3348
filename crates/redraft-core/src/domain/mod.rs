//! Domain models for redraft.
//!
//! - `RewardWeights`, `Evaluation`, `Degradation`: composite reward results
//! - `RevisionError`: error taxonomy shared by the core components

pub mod error;
pub mod reward;

pub use error::{Result, RevisionError, SearchStep};
pub use reward::{round3, Degradation, Evaluation, RewardWeights};
