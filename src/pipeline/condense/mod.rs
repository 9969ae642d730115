pub mod types;
pub mod units;
pub mod tfidf;
pub mod kmeans;
pub mod strategy;
pub mod condenser;

pub use types::*;
pub use units::*;
pub use strategy::*;
pub use condenser::*;

use thiserror::Error;

/// Failures inside a selection strategy. Never leaves the condenser:
/// `SalienceCondenser::condense` turns every one of these into the
/// truncated-head fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CondenseError {
    #[error("Vocabulary is empty after stop-word removal")]
    EmptyVocabulary,

    #[error("Need at least {required} units, got {found}")]
    TooFewUnits { found: usize, required: usize },

    #[error("Clustering failed: {0}")]
    Clustering(String),
}
