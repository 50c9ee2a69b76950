use std::sync::Arc;

use super::{
    CostModel, DegenerateReason, FeatureCache, FitOutcome, ForestConfig, Prediction, RandomForest,
};
use crate::error::{Error, Result};
use crate::feature::{FeatureExtractor, FeatureKind};
use crate::history::HistorySnapshot;
use crate::pool::WorkerPool;
use crate::space::ConfigSpace;

/// Scores closer than this count as identical.
const SCORE_EPS: f64 = 1e-12;

/// Random-forest cost model over cached feature vectors.
///
/// Targets are min-max normalized over the successes used for the fit, so
/// the best measured configuration maps to `1.0` and the worst to `0.0`.
/// Predictions are in the same units. Failed measurements never become
/// targets.
///
/// Each record is fitted on the feature vector stored with it, which is what
/// lets history from another run (even another space) warm-start the model.
/// Vectors shorter than the longest one are zero-padded.
///
/// The model owns a [`WorkerPool`] used for extraction and tree fitting.
/// After [`close`](CostModel::close) every call returns
/// [`Error::PoolClosed`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use autotuner::model::{CostModel, ForestCostModel};
/// use autotuner::feature::FeatureKind;
/// use autotuner::space::{Knob, KnobSpace};
///
/// let space = Arc::new(KnobSpace::new(vec![Knob::range("x", 0, 15)]).unwrap());
/// let model = ForestCostModel::new(space, FeatureKind::Flattened.extractor(), 1).unwrap();
///
/// // Untrained: neutral mean, maximal uncertainty.
/// let p = model.predict(&[3]).unwrap();
/// assert_eq!(p[0].mean, 0.0);
/// assert_eq!(p[0].std, 1.0);
/// ```
pub struct ForestCostModel {
    cache: FeatureCache,
    pool: WorkerPool,
    config: ForestConfig,
    forest: RandomForest,
    log_interval: usize,
    max_train_records: Option<usize>,
    n_fits: usize,
}

impl ForestCostModel {
    /// Creates an untrained model with its own pool of `num_threads`
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreadCount`] if `num_threads` is zero and
    /// [`Error::PoolBuild`] if the pool cannot be spawned.
    pub fn new(
        space: Arc<dyn ConfigSpace>,
        extractor: Arc<dyn FeatureExtractor>,
        num_threads: usize,
    ) -> Result<Self> {
        Ok(Self {
            cache: FeatureCache::new(space, extractor),
            pool: WorkerPool::new(num_threads)?,
            config: ForestConfig::default(),
            forest: RandomForest::default(),
            log_interval: 0,
            max_train_records: None,
            n_fits: 0,
        })
    }

    /// Sets the forest hyperparameters.
    #[must_use]
    pub fn forest_config(mut self, config: ForestConfig) -> Self {
        self.config = config;
        self
    }

    /// Log a summary every `max(log_interval / 2, 1)` fits; 0 disables.
    #[must_use]
    pub fn log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    /// Train only on the most recent `n` successes.
    #[must_use]
    pub fn max_train_records(mut self, n: Option<usize>) -> Self {
        self.max_train_records = n;
        self
    }

    /// Switch to a built-in extraction strategy, invalidating the cache.
    pub fn set_feature_kind(&mut self, kind: FeatureKind) {
        self.set_extractor(kind.extractor());
    }

    /// Switch to a custom extraction strategy, invalidating the cache.
    pub fn set_extractor(&mut self, extractor: Arc<dyn FeatureExtractor>) {
        self.cache.set_extractor(extractor);
    }

    /// The feature cache.
    #[must_use]
    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    /// Number of `fit` calls so far, degenerate ones included.
    #[must_use]
    pub fn n_fits(&self) -> usize {
        self.n_fits
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            Err(Error::PoolClosed)
        } else {
            Ok(())
        }
    }

    fn degenerate(&mut self, reason: DegenerateReason) -> FitOutcome {
        self.forest = RandomForest::default();
        trace_warn!(?reason, fit = self.n_fits, "cost model fell back to neutral predictions");
        FitOutcome::Degenerate(reason)
    }

    fn should_log(&self) -> bool {
        self.log_interval > 0 && self.n_fits % (self.log_interval / 2).max(1) == 0
    }
}

impl CostModel for ForestCostModel {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, snapshot: &HistorySnapshot) -> Result<FitOutcome> {
        self.ensure_open()?;
        self.n_fits += 1;

        let mut successes: Vec<_> = snapshot.successes().collect();
        if let Some(window) = self.max_train_records {
            let skip = successes.len().saturating_sub(window);
            successes.drain(..skip);
        }

        if successes.is_empty() {
            return Ok(self.degenerate(DegenerateReason::NoSuccesses));
        }
        if successes.len() < 2 {
            return Ok(self.degenerate(DegenerateReason::TooFewSamples));
        }

        let scores: Vec<f64> = successes
            .iter()
            .filter_map(|r| r.score())
            .collect();
        let (lo, hi) = scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });
        if hi - lo <= SCORE_EPS {
            return Ok(self.degenerate(DegenerateReason::ConstantScores));
        }
        let targets: Vec<f64> = scores.iter().map(|s| (s - lo) / (hi - lo)).collect();

        // Records without stored features are extracted now.
        let missing: Vec<usize> = successes
            .iter()
            .filter(|r| r.features.is_empty())
            .map(|r| r.index)
            .collect();
        let extracted = self.cache.get(&missing, &self.pool)?;
        let mut extracted = extracted.into_iter();
        let rows: Vec<Arc<[f64]>> = successes
            .iter()
            .map(|r| {
                if r.features.is_empty() {
                    extracted.next().unwrap_or_else(|| Arc::from(Vec::new()))
                } else {
                    Arc::clone(&r.features)
                }
            })
            .collect();

        let dim = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let padded = rows.iter().filter(|r| r.len() < dim).count();
        if padded > 0 {
            trace_warn!(padded, dim, "zero-padded short feature vectors");
        }
        let data: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                let mut row = r.to_vec();
                row.resize(dim, 0.0);
                row
            })
            .collect();

        let config = ForestConfig {
            seed: self
                .config
                .seed
                .map(|s| s.wrapping_add(self.n_fits as u64)),
            ..self.config.clone()
        };
        self.forest = RandomForest::fit(&data, &targets, &config, &self.pool)?;

        let n_samples = data.len();
        if self.should_log() {
            trace_info!(
                fit = self.n_fits,
                n_samples,
                dim,
                best = hi,
                "cost model refit"
            );
        }

        Ok(FitOutcome::Trained {
            n_samples,
            version: snapshot.version(),
        })
    }

    fn predict(&self, indices: &[usize]) -> Result<Vec<Prediction>> {
        self.ensure_open()?;
        if self.forest.is_empty() {
            return Ok(vec![Prediction::unknown(); indices.len()]);
        }
        let features = self.cache.get(indices, &self.pool)?;
        Ok(features.iter().map(|f| self.forest.predict(f)).collect())
    }

    fn features(&self, indices: &[usize]) -> Result<Vec<Arc<[f64]>>> {
        self.ensure_open()?;
        self.cache.get(indices, &self.pool)
    }

    fn is_trained(&self) -> bool {
        !self.forest.is_empty()
    }

    fn close(&mut self) -> Result<()> {
        self.pool.close()
    }
}

impl core::fmt::Debug for ForestCostModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForestCostModel")
            .field("cache", &self.cache)
            .field("pool", &self.pool)
            .field("n_trees", &self.forest.n_trees())
            .field("n_fits", &self.n_fits)
            .finish_non_exhaustive()
    }
}
