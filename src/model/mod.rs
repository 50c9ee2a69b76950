//! Cost models: learned predictors of configuration performance.
//!
//! A [`CostModel`] is refit at every plan boundary on a
//! [`HistorySnapshot`] and then queried many times by the optimizer. It
//! answers with a [`Prediction`] (a mean and an uncertainty) for every
//! candidate, including before it has ever been trained (neutral mean,
//! maximal uncertainty), so acquisition scores are always defined.
//!
//! The default implementation is [`ForestCostModel`], a random-forest
//! regressor over extracted features whose uncertainty is the spread of
//! its trees.

mod cache;
mod forest;
mod rf;

use std::sync::Arc;

pub use cache::FeatureCache;
pub use forest::{ForestConfig, RandomForest};
pub use rf::ForestCostModel;

use crate::error::Result;
use crate::history::HistorySnapshot;

/// Mean prediction used before the first successful fit.
pub const NEUTRAL_MEAN: f64 = 0.0;
/// Uncertainty used before the first successful fit (normalized units).
pub const MAX_UNCERTAINTY: f64 = 1.0;

/// A point prediction with its uncertainty, in normalized score units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Predicted normalized score (higher is better).
    pub mean: f64,
    /// Standard deviation of the prediction.
    pub std: f64,
}

impl Prediction {
    /// The prediction of an untrained model.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            mean: NEUTRAL_MEAN,
            std: MAX_UNCERTAINTY,
        }
    }
}

/// Why a fit fell back to the neutral model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegenerateReason {
    /// The history holds no successful measurement.
    NoSuccesses,
    /// Too few successes to learn anything.
    TooFewSamples,
    /// Every successful measurement has the same score.
    ConstantScores,
}

/// Result of [`CostModel::fit`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    /// The model was trained.
    Trained {
        /// Number of successful records used as targets.
        n_samples: usize,
        /// Snapshot version the model was fitted on.
        version: usize,
    },
    /// Nothing could be learned; predictions are neutral until the next fit.
    Degenerate(DegenerateReason),
}

impl FitOutcome {
    /// Returns `true` if the model was trained.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Trained { .. })
    }
}

/// A regression model with uncertainty over configuration indices.
///
/// Implementations own whatever worker resources they use and must release
/// them in [`close`](CostModel::close). After `close`, calls that need those
/// resources return [`Error::PoolClosed`](crate::Error::PoolClosed).
pub trait CostModel: Send + Sync {
    /// Train on the successful records of `snapshot`.
    ///
    /// Degenerate histories are not errors: the model resets to neutral
    /// predictions and reports [`FitOutcome::Degenerate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool fails or has been closed.
    fn fit(&mut self, snapshot: &HistorySnapshot) -> Result<FitOutcome>;

    /// Predict every index in `indices`, in order.
    ///
    /// Calling `predict` twice without a fit in between returns identical
    /// output.
    ///
    /// # Errors
    ///
    /// Returns an error if features are needed and cannot be extracted.
    fn predict(&self, indices: &[usize]) -> Result<Vec<Prediction>>;

    /// Feature vectors for `indices`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction is needed and the pool is closed.
    fn features(&self, indices: &[usize]) -> Result<Vec<Arc<[f64]>>>;

    /// Returns `true` if the last fit trained the model.
    fn is_trained(&self) -> bool;

    /// Release the model's worker resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the resources could not be released cleanly;
    /// the model counts as closed either way.
    fn close(&mut self) -> Result<()>;
}
