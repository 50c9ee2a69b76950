//! Acquisition optimizers: searching the space for promising candidates.
//!
//! A [`ModelOptimizer`] proposes unmeasured configurations that score well
//! under the current cost model and [`Acquisition`] function. The built-in
//! strategy is [`SimulatedAnnealingOptimizer`]; custom strategies implement
//! the trait and are handed to
//! [`TunerBuilder::optimizer`](crate::TunerBuilder::optimizer).
//!
//! | Name | Optimizer |
//! |------|-----------|
//! | `"sa"` | [`SimulatedAnnealingOptimizer`] with `parallel_size = 2 * plan_size` |

mod sa;

use std::collections::HashSet;

pub use sa::{SimulatedAnnealingOptimizer, SimulatedAnnealingOptimizerBuilder};

use crate::acquisition::Acquisition;
use crate::error::{Error, Result};
use crate::model::CostModel;
use crate::space::ConfigSpace;

/// Everything an optimizer needs to know about one planning cycle.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    /// The space to search.
    pub space: &'a dyn ConfigSpace,
    /// How to rank model predictions.
    pub acquisition: Acquisition,
    /// Indices that must not be proposed (already measured).
    pub exclude: &'a HashSet<usize>,
}

impl SearchContext<'_> {
    /// Number of configurations that may still be proposed.
    #[must_use]
    pub fn n_unmeasured(&self) -> usize {
        self.space.len().saturating_sub(self.exclude.len())
    }
}

/// Searches the space for candidates with high acquisition score.
///
/// Implementations must be `Send + Sync`; interior state such as an RNG is
/// kept behind a lock.
pub trait ModelOptimizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Propose up to `num` distinct indices not in `ctx.exclude`, best
    /// first.
    ///
    /// Fewer than `num` are returned only when fewer unmeasured
    /// configurations exist. Nothing is returned for an exhausted space.
    ///
    /// # Errors
    ///
    /// Propagates errors from the cost model.
    fn find_candidates(
        &self,
        model: &dyn CostModel,
        ctx: &SearchContext<'_>,
        num: usize,
    ) -> Result<Vec<usize>>;
}

/// Instantiate a built-in optimizer by name.
///
/// # Errors
///
/// Returns [`Error::UnknownOptimizer`] for names not in the registry.
pub fn from_name(
    name: &str,
    plan_size: usize,
    log_interval: usize,
    seed: Option<u64>,
) -> Result<Box<dyn ModelOptimizer>> {
    match name {
        "sa" => {
            let mut builder = SimulatedAnnealingOptimizer::builder()
                .parallel_size(plan_size.saturating_mul(2).max(1))
                .log_interval(log_interval);
            if let Some(seed) = seed {
                builder = builder.seed(seed);
            }
            Ok(Box::new(builder.build()))
        }
        other => Err(Error::UnknownOptimizer(other.to_string())),
    }
}

/// Top up `picked` to `num` entries with unmeasured indices: a bounded
/// number of random draws first, then a linear scan.
pub(crate) fn fill_unmeasured(
    ctx: &SearchContext<'_>,
    picked: &mut Vec<usize>,
    num: usize,
    rng: &mut fastrand::Rng,
) {
    let target = num.min(picked.len() + ctx.n_unmeasured());
    if picked.len() >= target {
        return;
    }
    let mut seen: HashSet<usize> = picked.iter().copied().collect();
    let len = ctx.space.len();

    let attempts = 4 * (target - picked.len());
    for _ in 0..attempts {
        if picked.len() >= target {
            return;
        }
        let index = ctx.space.sample(rng);
        if !ctx.exclude.contains(&index) && seen.insert(index) {
            picked.push(index);
        }
    }

    for index in 0..len {
        if picked.len() >= target {
            return;
        }
        if !ctx.exclude.contains(&index) && seen.insert(index) {
            picked.push(index);
        }
    }
}
