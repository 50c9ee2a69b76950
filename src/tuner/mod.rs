//! The tuning loop: plan, measure, refit.

use std::collections::HashSet;
use std::sync::Arc;

use crate::acquisition::UncertaintySchedule;
use crate::diversity::DiversityFilter;
use crate::error::{Error, Result};
use crate::history::{HistorySnapshot, MeasurementRecord};
use crate::model::CostModel;
use crate::optimizer::ModelOptimizer;
use crate::space::ConfigSpace;
use crate::storage::Storage;
use crate::types::{StopReason, TunerState};

mod builder;
mod tune;

pub use builder::{TunerBuilder, TunerConfig};

/// What a [`Tuner::tune`] call did.
#[derive(Clone, Debug)]
pub struct TuneSummary {
    /// Configurations measured in this call.
    pub trials: usize,
    /// Of which succeeded.
    pub successes: usize,
    /// Of which failed.
    pub failures: usize,
    /// Cost model refits in this call, the initial one included.
    pub refits: usize,
    /// Best record in the whole history.
    pub best: Option<Arc<MeasurementRecord>>,
    /// Why the loop ended.
    pub stop_reason: StopReason,
}

/// Model-based search over a [`ConfigSpace`].
///
/// A tuner alternates between planning (refit the cost model, let the
/// optimizer propose `plan_size` promising unmeasured configurations) and
/// measuring (hand batches of the plan to a [`Measurer`](crate::Measurer)
/// and append the results to history). See [`tune`](Self::tune).
///
/// The cost model's worker pool is released when `tune` returns, whatever
/// the outcome, or earlier through [`close`](Self::close). A tuner is
/// therefore good for a single `tune` call; resume a run by building a new
/// tuner over the same storage.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
///
/// use autotuner::prelude::*;
///
/// let space = KnobSpace::new(vec![Knob::range("x", 0, 9), Knob::range("y", 0, 9)]).unwrap();
/// let mut tuner = Tuner::builder(space.clone())
///     .plan_size(8)
///     .num_threads(1)
///     .seed(7)
///     .build()
///     .unwrap();
///
/// let summary = tuner
///     .tune(40, &mut |batch: &[usize]| {
///         batch
///             .iter()
///             .map(|&i| {
///                 let p = space.point(i);
///                 let score = 100.0 - ((p[0] - 7).pow(2) + (p[1] - 2).pow(2)) as f64;
///                 MeasureResult::success(score, Duration::from_millis(1))
///             })
///             .collect::<Vec<_>>()
///     })
///     .unwrap();
///
/// assert_eq!(summary.trials, 40);
/// assert!(tuner.best().is_some());
/// assert_eq!(tuner.state(), TunerState::Done);
/// ```
pub struct Tuner {
    space: Arc<dyn ConfigSpace>,
    config: TunerConfig,
    model: Box<dyn CostModel>,
    optimizer: Box<dyn ModelOptimizer>,
    diversity: Option<DiversityFilter>,
    schedule: UncertaintySchedule,
    storage: Arc<dyn Storage>,
    /// Indices of this space that are measured or dispatched.
    visited: HashSet<usize>,
    plan: Vec<usize>,
    cursor: usize,
    trials_since_refit: usize,
    n_successes: usize,
    n_refits: usize,
    best: Option<Arc<MeasurementRecord>>,
    state: TunerState,
    rng: fastrand::Rng,
    closed: bool,
}

impl Tuner {
    /// Return a [`TunerBuilder`] over `space`.
    #[must_use]
    pub fn builder(space: impl ConfigSpace + 'static) -> TunerBuilder {
        TunerBuilder::new(Arc::new(space))
    }

    /// Return a [`TunerBuilder`] over a shared space.
    #[must_use]
    pub fn builder_shared(space: Arc<dyn ConfigSpace>) -> TunerBuilder {
        TunerBuilder::new(space)
    }

    /// The options the tuner was built with.
    #[must_use]
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// The space being searched.
    #[must_use]
    pub fn space(&self) -> &Arc<dyn ConfigSpace> {
        &self.space
    }

    /// Current phase of the loop.
    #[must_use]
    pub fn state(&self) -> TunerState {
        self.state
    }

    /// The current plan, in proposal order.
    #[must_use]
    pub fn plan(&self) -> &[usize] {
        &self.plan
    }

    /// The best successful measurement so far.
    #[must_use]
    pub fn best(&self) -> Option<Arc<MeasurementRecord>> {
        self.best.clone()
    }

    /// A snapshot of the whole history.
    #[must_use]
    pub fn history(&self) -> HistorySnapshot {
        self.storage.snapshot()
    }

    /// Number of records in history, loaded ones included.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.storage.len()
    }

    /// Number of cost model refits so far.
    #[must_use]
    pub fn n_refits(&self) -> usize {
        self.n_refits
    }

    /// Returns `true` once the worker pool has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Add records from an earlier run to history.
    ///
    /// Every record is appended (with a fresh id) and feeds the next fit.
    /// Records whose index and stored features match this space also count
    /// as measured, so they are never proposed again, and can become the
    /// best.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] after the tuner has been closed.
    pub fn load_history(
        &mut self,
        records: impl IntoIterator<Item = MeasurementRecord>,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::PoolClosed);
        }
        let mut _loaded = 0usize;
        for mut record in records {
            record.id = self.storage.next_record_id();
            let record = Arc::new(record);
            self.storage.push(MeasurementRecord::clone(&record));
            self.absorb(&record)?;
            _loaded += 1;
        }
        trace_info!(loaded = _loaded, visited = self.visited.len(), "history loaded");
        Ok(())
    }

    /// Release the cost model's worker pool.
    ///
    /// Idempotent. Afterwards [`tune`](Self::tune) and
    /// [`load_history`](Self::load_history) return [`Error::PoolClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolShutdownTimeout`] if worker threads did not exit
    /// in time. The tuner counts as closed either way.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.state = TunerState::Done;
        self.model.close()
    }

    /// Fold a stored record into the tuner's bookkeeping.
    fn absorb(&mut self, record: &Arc<MeasurementRecord>) -> Result<()> {
        if !self.belongs_to_space(record)? {
            return Ok(());
        }
        self.visited.insert(record.index);
        if record.outcome.is_success() {
            self.n_successes += 1;
            self.offer_best(record);
        }
        Ok(())
    }

    fn belongs_to_space(&self, record: &MeasurementRecord) -> Result<bool> {
        if record.index >= self.space.len() {
            return Ok(false);
        }
        if record.features.is_empty() {
            return Ok(true);
        }
        let features = self.model.features(&[record.index])?;
        Ok(features.first().is_some_and(|f| same_features(f, &record.features)))
    }

    /// Replace the best record if `record` is strictly better.
    fn offer_best(&mut self, record: &Arc<MeasurementRecord>) -> bool {
        let Some(score) = record.score().filter(|s| s.is_finite()) else {
            return false;
        };
        let improved = self
            .best
            .as_ref()
            .and_then(|b| b.score())
            .is_none_or(|best| score > best);
        if improved {
            self.best = Some(Arc::clone(record));
        }
        improved
    }
}

/// Feature vectors match up to serialization round-off.
fn same_features(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0))
}

impl core::fmt::Debug for Tuner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tuner")
            .field("config", &self.config)
            .field("optimizer", &self.optimizer.name())
            .field("state", &self.state)
            .field("n_trials", &self.n_trials())
            .field("visited", &self.visited.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
