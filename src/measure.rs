//! The [`Measurer`] trait: how candidates get compiled and timed.
//!
//! The tuner never runs anything itself. It hands each batch of
//! configuration indices to a measurer and gets one [`MeasureResult`] back
//! per index, in the same order. For simple cases a closure is enough:
//!
//! ```
//! use core::time::Duration;
//!
//! use autotuner::prelude::*;
//!
//! let space = KnobSpace::new(vec![Knob::range("x", 0, 31)]).unwrap();
//! let mut tuner = Tuner::builder(space).plan_size(8).num_threads(1).seed(1).build().unwrap();
//!
//! let summary = tuner
//!     .tune(16, &mut |batch: &[usize]| {
//!         batch
//!             .iter()
//!             .map(|&i| MeasureResult::success(i as f64, Duration::ZERO))
//!             .collect::<Vec<_>>()
//!     })
//!     .unwrap();
//! assert_eq!(summary.trials, 16);
//! ```
//!
//! Implement the trait on a struct to get per-batch hooks, for example to
//! stop once a target is reached:
//!
//! ```
//! use core::ops::ControlFlow;
//! use core::time::Duration;
//! use std::sync::Arc;
//!
//! use autotuner::prelude::*;
//!
//! struct UntilTarget(f64);
//!
//! impl Measurer for UntilTarget {
//!     fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
//!         batch
//!             .iter()
//!             .map(|&i| MeasureResult::success(i as f64, Duration::ZERO))
//!             .collect()
//!     }
//!
//!     fn after_batch(&mut self, progress: &Progress, _: &[Arc<MeasurementRecord>]) -> ControlFlow<()> {
//!         if progress.best_score.is_some_and(|s| s >= self.0) {
//!             ControlFlow::Break(())
//!         } else {
//!             ControlFlow::Continue(())
//!         }
//!     }
//! }
//!
//! let space = KnobSpace::new(vec![Knob::range("x", 0, 63)]).unwrap();
//! let mut tuner = Tuner::builder(space).plan_size(8).num_threads(1).seed(3).build().unwrap();
//! let summary = tuner.tune(64, &mut UntilTarget(40.0)).unwrap();
//! assert!(summary.best.unwrap().score().unwrap() >= 40.0 || summary.trials == 64);
//! ```

use core::ops::ControlFlow;
use std::sync::Arc;

use crate::history::{MeasureResult, MeasurementRecord};

/// Where the tuning loop stands, passed to the [`Measurer`] hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Trials measured so far in this `tune` call.
    pub trials: usize,
    /// The trial budget of this `tune` call.
    pub budget: usize,
    /// Successful measurements in the whole history.
    pub successes: usize,
    /// Best score in the whole history.
    pub best_score: Option<f64>,
}

/// Measures batches of candidate configurations.
///
/// The only required method is [`measure`](Measurer::measure). It must
/// return exactly one result per input index, in input order; anything else
/// makes [`Tuner::tune`](crate::Tuner::tune) fail with
/// [`Error::MeasurementCountMismatch`](crate::Error::MeasurementCountMismatch).
/// Failing candidates are reported as
/// [`Outcome::Failure`](crate::Outcome::Failure), never by panicking.
pub trait Measurer {
    /// Measure every configuration in `batch`.
    fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult>;

    /// Called before each batch is dispatched.
    ///
    /// Return `ControlFlow::Break(())` to stop tuning before the batch runs.
    ///
    /// Default: always continues.
    fn before_batch(&mut self, _progress: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called after each batch has been folded into history.
    ///
    /// Return `ControlFlow::Break(())` to stop tuning.
    ///
    /// Default: always continues.
    fn after_batch(
        &mut self,
        _progress: &Progress,
        _records: &[Arc<MeasurementRecord>],
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> Measurer for F
where
    F: FnMut(&[usize]) -> Vec<MeasureResult>,
{
    fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
        self(batch)
    }
}
