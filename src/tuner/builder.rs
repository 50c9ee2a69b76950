use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Tuner;
use crate::acquisition::UncertaintySchedule;
use crate::diversity::DiversityFilter;
use crate::error::{Error, Result};
use crate::feature::{FeatureExtractor, FeatureKind};
use crate::model::{CostModel, ForestConfig, ForestCostModel};
use crate::optimizer::{self, ModelOptimizer};
use crate::pool::resolve_num_threads;
use crate::space::ConfigSpace;
use crate::storage::{MemoryStorage, Storage};
use crate::types::TunerState;

/// Construction-time options of a [`Tuner`].
///
/// Every field has a default; see the field docs. Under the `serde`
/// feature the struct can be read from JSON, with missing fields taking
/// their defaults.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TunerConfig {
    /// Candidates per plan; also the number of trials between refits
    /// (default: 32).
    pub plan_size: usize,
    /// Candidates per measurement batch. `None` uses `plan_size`.
    pub batch_size: Option<usize>,
    /// Feature extraction strategy (default: structural).
    pub feature_type: FeatureKind,
    /// Worker threads for the cost model. `None` uses the available
    /// hardware parallelism.
    pub num_threads: Option<usize>,
    /// Name of a built-in optimizer (default: `"sa"`). Ignored when a custom
    /// optimizer is supplied.
    pub optimizer: String,
    /// Shortlist `ratio * plan_size` candidates and thin them for
    /// diversity. `None` disables the filter.
    pub diversity_filter_ratio: Option<f64>,
    /// Log progress every `log_interval` trials; 0 is silent (default: 50).
    pub log_interval: usize,
    /// Rank by expected improvement rather than the point prediction
    /// (default: `true`).
    pub uncertainty_aware: bool,
    /// Successes after which the uncertainty weight halves. `None` uses
    /// `4 * plan_size`.
    pub uncertainty_half_life: Option<usize>,
    /// Fraction at the end of each plan replaced by random unvisited
    /// configurations (default: 0.05).
    pub epsilon_greedy: f64,
    /// Stop after this many trials without a new best. `None` disables.
    pub early_stopping: Option<usize>,
    /// Fit the model on at most this many recent successes. `None` uses
    /// the whole history.
    pub max_train_records: Option<usize>,
    /// Seed for every random choice the tuner makes.
    pub seed: Option<u64>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            plan_size: 32,
            batch_size: None,
            feature_type: FeatureKind::Structural,
            num_threads: None,
            optimizer: "sa".to_string(),
            diversity_filter_ratio: None,
            log_interval: 50,
            uncertainty_aware: true,
            uncertainty_half_life: None,
            epsilon_greedy: 0.05,
            early_stopping: None,
            max_train_records: None,
            seed: None,
        }
    }
}

impl TunerConfig {
    /// Check every option that can be checked without building anything.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.plan_size == 0 {
            return Err(Error::InvalidPlanSize);
        }
        if self.batch_size == Some(0) {
            return Err(Error::InvalidBatchSize);
        }
        if self.num_threads == Some(0) {
            return Err(Error::InvalidThreadCount);
        }
        if let Some(ratio) = self.diversity_filter_ratio {
            DiversityFilter::new(ratio)?;
        }
        if !(0.0..=1.0).contains(&self.epsilon_greedy) {
            return Err(Error::InvalidEpsilon(self.epsilon_greedy));
        }
        if self.uncertainty_half_life == Some(0) {
            return Err(Error::InvalidHalfLife);
        }
        Ok(())
    }

    /// Resolved measurement batch size.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(self.plan_size)
    }

    /// Resolved uncertainty half-life.
    #[must_use]
    pub fn effective_half_life(&self) -> usize {
        self.uncertainty_half_life
            .unwrap_or_else(|| self.plan_size.saturating_mul(4))
    }
}

/// A builder for [`Tuner`] instances.
///
/// Created via [`Tuner::builder`]. Options can be set one by one or all at
/// once with [`config`](Self::config); custom optimizer, cost model,
/// storage and feature extractor objects replace the built-in ones.
/// Everything is validated in [`build`](Self::build).
///
/// # Defaults
///
/// - Optimizer: [`SimulatedAnnealingOptimizer`](crate::optimizer::SimulatedAnnealingOptimizer)
/// - Cost model: [`ForestCostModel`]
/// - Storage: [`MemoryStorage`]
///
/// # Examples
///
/// ```
/// use autotuner::prelude::*;
///
/// let space = KnobSpace::new(vec![
///     Knob::new("tile", vec![1, 2, 4, 8, 16]),
///     Knob::new("unroll", vec![0, 1]),
/// ])
/// .unwrap();
///
/// let tuner = Tuner::builder(space)
///     .plan_size(8)
///     .feature_type(FeatureKind::Flattened)
///     .diversity_filter_ratio(2.0)
///     .num_threads(2)
///     .seed(42)
///     .build()
///     .unwrap();
///
/// assert_eq!(tuner.config().plan_size, 8);
/// ```
pub struct TunerBuilder {
    space: Arc<dyn ConfigSpace>,
    config: TunerConfig,
    optimizer: Option<Box<dyn ModelOptimizer>>,
    cost_model: Option<Box<dyn CostModel>>,
    storage: Option<Arc<dyn Storage>>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
    forest: Option<ForestConfig>,
}

impl TunerBuilder {
    pub(super) fn new(space: Arc<dyn ConfigSpace>) -> Self {
        Self {
            space,
            config: TunerConfig::default(),
            optimizer: None,
            cost_model: None,
            storage: None,
            extractor: None,
            forest: None,
        }
    }

    /// Replace every option at once.
    #[must_use]
    pub fn config(mut self, config: TunerConfig) -> Self {
        self.config = config;
        self
    }

    /// Candidates per plan and trials between refits.
    #[must_use]
    pub fn plan_size(mut self, plan_size: usize) -> Self {
        self.config.plan_size = plan_size;
        self
    }

    /// Candidates per measurement batch.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = Some(batch_size);
        self
    }

    /// Built-in feature extraction strategy.
    #[must_use]
    pub fn feature_type(mut self, kind: FeatureKind) -> Self {
        self.config.feature_type = kind;
        self
    }

    /// Worker threads for the cost model.
    #[must_use]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = Some(num_threads);
        self
    }

    /// Built-in optimizer by name.
    #[must_use]
    pub fn optimizer_name(mut self, name: impl Into<String>) -> Self {
        self.config.optimizer = name.into();
        self
    }

    /// Enable the diversity filter with the given shortlist ratio.
    #[must_use]
    pub fn diversity_filter_ratio(mut self, ratio: f64) -> Self {
        self.config.diversity_filter_ratio = Some(ratio);
        self
    }

    /// Progress logging interval in trials; 0 is silent.
    #[must_use]
    pub fn log_interval(mut self, log_interval: usize) -> Self {
        self.config.log_interval = log_interval;
        self
    }

    /// Toggle uncertainty-aware acquisition.
    #[must_use]
    pub fn uncertainty_aware(mut self, enabled: bool) -> Self {
        self.config.uncertainty_aware = enabled;
        self
    }

    /// Successes after which the uncertainty weight halves.
    #[must_use]
    pub fn uncertainty_half_life(mut self, half_life: usize) -> Self {
        self.config.uncertainty_half_life = Some(half_life);
        self
    }

    /// Fraction of each plan replaced by random exploration.
    #[must_use]
    pub fn epsilon_greedy(mut self, epsilon: f64) -> Self {
        self.config.epsilon_greedy = epsilon;
        self
    }

    /// Stop after `patience` trials without a new best.
    #[must_use]
    pub fn early_stopping(mut self, patience: usize) -> Self {
        self.config.early_stopping = Some(patience);
        self
    }

    /// Fit on at most `n` recent successes.
    #[must_use]
    pub fn max_train_records(mut self, n: usize) -> Self {
        self.config.max_train_records = Some(n);
        self
    }

    /// Seed for reproducible tuning.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Use a custom optimizer instead of a named one.
    #[must_use]
    pub fn optimizer(mut self, optimizer: impl ModelOptimizer + 'static) -> Self {
        self.optimizer = Some(Box::new(optimizer));
        self
    }

    /// Use a custom cost model. Feature, thread and forest options then
    /// only apply if the model reads them itself.
    #[must_use]
    pub fn cost_model(mut self, model: impl CostModel + 'static) -> Self {
        self.cost_model = Some(Box::new(model));
        self
    }

    /// Use a custom storage backend.
    ///
    /// Records already in the storage count as history: they are marked
    /// measured and seed the first fit.
    #[must_use]
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Use a custom feature extractor for the default cost model.
    #[must_use]
    pub fn feature_extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Forest hyperparameters for the default cost model.
    #[must_use]
    pub fn forest_config(mut self, config: ForestConfig) -> Self {
        self.forest = Some(config);
        self
    }

    /// Validate the options and build the [`Tuner`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options or an unknown
    /// optimizer name, [`Error::EmptySpace`] for an empty space, and pool
    /// errors if the worker threads cannot be spawned.
    pub fn build(self) -> Result<Tuner> {
        let config = self.config;
        config.validate()?;
        if self.space.is_empty() {
            return Err(Error::EmptySpace);
        }

        let optimizer = match self.optimizer {
            Some(optimizer) => optimizer,
            None => optimizer::from_name(
                &config.optimizer,
                config.plan_size,
                config.log_interval,
                config.seed,
            )?,
        };

        let model: Box<dyn CostModel> = match self.cost_model {
            Some(model) => model,
            None => {
                let num_threads = resolve_num_threads(config.num_threads)?;
                let extractor = self
                    .extractor
                    .unwrap_or_else(|| config.feature_type.extractor());
                let defaults = ForestConfig::default();
                let forest = self.forest.unwrap_or(ForestConfig {
                    seed: config.seed.or(defaults.seed),
                    ..defaults
                });
                Box::new(
                    ForestCostModel::new(Arc::clone(&self.space), extractor, num_threads)?
                        .forest_config(forest)
                        .log_interval(config.log_interval)
                        .max_train_records(config.max_train_records),
                )
            }
        };

        let diversity = config
            .diversity_filter_ratio
            .map(DiversityFilter::new)
            .transpose()?;
        let schedule = UncertaintySchedule::new(1.0, config.effective_half_life())?;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let rng = crate::rng_util::seeded(config.seed.map(|s| s.wrapping_add(1)));

        let mut tuner = Tuner {
            space: self.space,
            config,
            model,
            optimizer,
            diversity,
            schedule,
            storage,
            visited: HashSet::new(),
            plan: Vec::new(),
            cursor: 0,
            trials_since_refit: 0,
            n_successes: 0,
            n_refits: 0,
            best: None,
            state: TunerState::Idle,
            rng,
            closed: false,
        };

        let preloaded = tuner.storage.snapshot();
        for record in preloaded.records() {
            tuner.absorb(record)?;
        }
        if !preloaded.is_empty() {
            trace_info!(
                records = preloaded.len(),
                visited = tuner.visited.len(),
                "resuming from stored history"
            );
        }

        Ok(tuner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = TunerConfig::default();
        assert_eq!(c.plan_size, 32);
        assert_eq!(c.effective_batch_size(), 32);
        assert_eq!(c.effective_half_life(), 128);
        assert_eq!(c.feature_type, FeatureKind::Structural);
        assert_eq!(c.optimizer, "sa");
        assert_eq!(c.log_interval, 50);
        assert!(c.uncertainty_aware);
        assert!((c.epsilon_greedy - 0.05).abs() < 1e-12);
        c.validate().unwrap();
    }

    #[test]
    fn validation_errors() {
        let bad = |f: fn(&mut TunerConfig)| {
            let mut c = TunerConfig::default();
            f(&mut c);
            c.validate().unwrap_err()
        };
        assert!(matches!(bad(|c| c.plan_size = 0), Error::InvalidPlanSize));
        assert!(matches!(bad(|c| c.batch_size = Some(0)), Error::InvalidBatchSize));
        assert!(matches!(bad(|c| c.num_threads = Some(0)), Error::InvalidThreadCount));
        assert!(matches!(
            bad(|c| c.diversity_filter_ratio = Some(1.0)),
            Error::InvalidDiversityRatio(_)
        ));
        assert!(matches!(bad(|c| c.epsilon_greedy = 1.5), Error::InvalidEpsilon(_)));
        assert!(matches!(bad(|c| c.epsilon_greedy = f64::NAN), Error::InvalidEpsilon(_)));
        assert!(matches!(
            bad(|c| c.uncertainty_half_life = Some(0)),
            Error::InvalidHalfLife
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_from_partial_json() {
        let c: TunerConfig =
            serde_json::from_str(r#"{"plan_size": 8, "feature_type": "flattened"}"#).unwrap();
        assert_eq!(c.plan_size, 8);
        assert_eq!(c.feature_type, FeatureKind::Flattened);
        assert_eq!(c.optimizer, "sa");
    }
}
