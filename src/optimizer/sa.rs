//! Simulated annealing over the configuration space.
//!
//! A population of walkers starts at random configurations. Every step each
//! walker proposes a [`neighbor`](ConfigSpace::neighbor), the whole batch is
//! scored through the cost model at once, and each walker accepts its move
//! with probability `min(1, exp((new - old) / (t + 1e-5)))`. The temperature
//! falls linearly from `temp.0` to `temp.1` over `n_iter` steps.
//!
//! Along the way the optimizer keeps the `num` best distinct unmeasured
//! configurations it has seen. It stops after `n_iter` steps or once that
//! set has not changed for `early_stop` steps.

use core::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use parking_lot::Mutex;

use super::{ModelOptimizer, SearchContext, fill_unmeasured};
use crate::error::Result;
use crate::model::CostModel;
use crate::rng_util;

/// A scored candidate, ordered so that `BinaryHeap` pops the *worst* first.
#[derive(Clone, Copy, Debug)]
struct Scored {
    score: f64,
    index: usize,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// The best `capacity` distinct candidates seen so far.
struct TopK {
    heap: BinaryHeap<Scored>,
    members: HashSet<usize>,
    capacity: usize,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Offer a candidate; returns `true` if the set changed.
    fn offer(&mut self, index: usize, score: f64) -> bool {
        if self.capacity == 0 || self.members.contains(&index) || score.is_nan() {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Scored { score, index });
            self.members.insert(index);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if score > worst.score => {
                if let Some(evicted) = self.heap.pop() {
                    self.members.remove(&evicted.index);
                }
                self.heap.push(Scored { score, index });
                self.members.insert(index);
                true
            }
            _ => false,
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn best(&self) -> f64 {
        self.heap
            .iter()
            .map(|s| s.score)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Indices, best first.
    fn into_sorted(self) -> Vec<usize> {
        // `Scored` orders worst-first, so ascending order is best-first.
        self.heap.into_sorted_vec().into_iter().map(|s| s.index).collect()
    }
}

/// Simulated-annealing acquisition optimizer.
///
/// # Examples
///
/// ```
/// use autotuner::optimizer::SimulatedAnnealingOptimizer;
///
/// let sa = SimulatedAnnealingOptimizer::builder()
///     .n_iter(200)
///     .temp(1.0, 0.0)
///     .parallel_size(64)
///     .early_stop(Some(30))
///     .seed(7)
///     .build();
/// assert_eq!(sa.n_iter(), 200);
/// ```
pub struct SimulatedAnnealingOptimizer {
    n_iter: usize,
    temp: (f64, f64),
    parallel_size: usize,
    early_stop: Option<usize>,
    log_interval: usize,
    rng: Mutex<fastrand::Rng>,
}

impl SimulatedAnnealingOptimizer {
    /// Creates an optimizer with default settings and a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an optimizer with default settings and a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::builder().seed(seed).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> SimulatedAnnealingOptimizerBuilder {
        SimulatedAnnealingOptimizerBuilder::new()
    }

    /// Maximum number of annealing steps per call.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Start and end temperature.
    #[must_use]
    pub fn temp(&self) -> (f64, f64) {
        self.temp
    }

    /// Number of walkers.
    #[must_use]
    pub fn parallel_size(&self) -> usize {
        self.parallel_size
    }

    /// Steps without improvement of the top set before stopping.
    #[must_use]
    pub fn early_stop(&self) -> Option<usize> {
        self.early_stop
    }
}

impl Default for SimulatedAnnealingOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelOptimizer for SimulatedAnnealingOptimizer {
    fn name(&self) -> &str {
        "sa"
    }

    #[allow(clippy::cast_precision_loss)]
    fn find_candidates(
        &self,
        model: &dyn CostModel,
        ctx: &SearchContext<'_>,
        num: usize,
    ) -> Result<Vec<usize>> {
        let num = num.min(ctx.n_unmeasured());
        if num == 0 {
            return Ok(Vec::new());
        }

        let mut rng = self.rng.lock();
        let space = ctx.space;
        let acquisition = ctx.acquisition;
        let mut top = TopK::new(num);

        let n_walkers = self.parallel_size.max(1);
        let mut points: Vec<usize> = (0..n_walkers).map(|_| space.sample(&mut rng)).collect();
        let mut scores = acquisition.score_all(&model.predict(&points)?);
        for s in &mut scores {
            if s.is_nan() {
                *s = f64::NEG_INFINITY;
            }
        }
        for (&p, &s) in points.iter().zip(&scores) {
            if !ctx.exclude.contains(&p) {
                top.offer(p, s);
            }
        }

        let (t0, t1) = self.temp;
        let cool = (t0 - t1) / (self.n_iter + 1) as f64;
        let mut t = t0;
        let mut last_change = 0;
        let mut _steps = 0;

        for k in 0..self.n_iter {
            _steps = k + 1;
            let proposals: Vec<usize> = points
                .iter()
                .map(|&p| space.neighbor(p, &mut rng))
                .collect();
            let proposal_scores = acquisition.score_all(&model.predict(&proposals)?);

            for w in 0..n_walkers {
                if accepts(scores[w], proposal_scores[w], t, &mut rng) {
                    points[w] = proposals[w];
                    scores[w] = proposal_scores[w];
                }
            }

            for (&p, &s) in proposals.iter().zip(&proposal_scores) {
                if !ctx.exclude.contains(&p) && top.offer(p, s) {
                    last_change = k;
                }
            }

            t -= cool;

            if self.log_interval > 0 && k % self.log_interval == 0 {
                trace_debug!(step = k, temp = t, best = top.best(), "annealing");
            }

            if self.early_stop.is_some_and(|n| k - last_change >= n) {
                break;
            }
        }

        trace_debug!(steps = _steps, found = top.heap.len(), wanted = num, "annealing finished");

        let mut picked = top.into_sorted();
        if picked.len() < num {
            fill_unmeasured(ctx, &mut picked, num, &mut rng);
        }
        Ok(picked)
    }
}

/// Metropolis rule for maximisation. A NaN proposal is never taken.
fn accepts(current: f64, proposal: f64, temp: f64, rng: &mut fastrand::Rng) -> bool {
    if proposal.is_nan() {
        return false;
    }
    if proposal >= current {
        return true;
    }
    rng.f64() < ((proposal - current) / (temp + 1e-5)).exp()
}

/// Builder for [`SimulatedAnnealingOptimizer`].
///
/// Defaults:
/// - `n_iter`: 500
/// - `temp`: `(1.0, 0.0)`
/// - `parallel_size`: 128
/// - `early_stop`: `Some(50)`
/// - `log_interval`: 0 (silent)
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct SimulatedAnnealingOptimizerBuilder {
    n_iter: usize,
    temp: (f64, f64),
    parallel_size: usize,
    early_stop: Option<usize>,
    log_interval: usize,
    seed: Option<u64>,
}

impl Default for SimulatedAnnealingOptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAnnealingOptimizerBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_iter: 500,
            temp: (1.0, 0.0),
            parallel_size: 128,
            early_stop: Some(50),
            log_interval: 0,
            seed: None,
        }
    }

    /// Sets the maximum number of annealing steps per call.
    #[must_use]
    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Sets the start and end temperature.
    #[must_use]
    pub fn temp(mut self, start: f64, end: f64) -> Self {
        self.temp = (start, end);
        self
    }

    /// Sets the number of walkers (at least 1).
    #[must_use]
    pub fn parallel_size(mut self, parallel_size: usize) -> Self {
        self.parallel_size = parallel_size.max(1);
        self
    }

    /// Sets how many steps without improvement end the search early.
    /// `None` always runs `n_iter` steps.
    #[must_use]
    pub fn early_stop(mut self, early_stop: Option<usize>) -> Self {
        self.early_stop = early_stop;
        self
    }

    /// Log progress every `log_interval` steps; 0 disables.
    #[must_use]
    pub fn log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the optimizer.
    #[must_use]
    pub fn build(self) -> SimulatedAnnealingOptimizer {
        SimulatedAnnealingOptimizer {
            n_iter: self.n_iter,
            temp: self.temp,
            parallel_size: self.parallel_size,
            early_stop: self.early_stop,
            log_interval: self.log_interval,
            rng: Mutex::new(rng_util::seeded(self.seed)),
        }
    }
}
