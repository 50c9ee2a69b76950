#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Model-based search for high-performance configurations of large discrete
//! tuning spaces (tile sizes, unroll factors, loop orders) without measuring
//! every point.
//!
//! A [`Tuner`] runs the plan / measure / refit cycle: a random-forest cost
//! model predicts the performance of unmeasured configurations together
//! with an uncertainty, simulated annealing searches the space for the
//! candidates with the highest expected improvement, an optional diversity
//! filter spreads the plan out, and batches of the plan go to your
//! [`Measurer`]. Every result is appended to history and the model is refit
//! after each `plan_size` trials.
//!
//! # Getting Started
//!
//! ```
//! use core::time::Duration;
//!
//! use autotuner::prelude::*;
//!
//! let space = KnobSpace::new(vec![
//!     Knob::new("tile_x", vec![1, 2, 4, 8, 16, 32]),
//!     Knob::new("tile_y", vec![1, 2, 4, 8, 16, 32]),
//!     Knob::new("unroll", vec![0, 1, 2, 4]),
//! ])
//! .unwrap();
//!
//! let mut tuner = Tuner::builder(space.clone())
//!     .plan_size(16)
//!     .num_threads(2)
//!     .seed(1)
//!     .build()
//!     .unwrap();
//!
//! let summary = tuner
//!     .tune(48, &mut |batch: &[usize]| {
//!         batch
//!             .iter()
//!             .map(|&i| {
//!                 let p = space.point(i);
//!                 if p[0] * p[1] > 256 {
//!                     return MeasureResult::failure(
//!                         FailureKind::InvalidConfig,
//!                         "tile too large",
//!                         Duration::ZERO,
//!                     );
//!                 }
//!                 let gflops = (p[0] * p[1]) as f64 / (1.0 + p[2] as f64).sqrt();
//!                 MeasureResult::success(gflops, Duration::from_millis(3))
//!             })
//!             .collect::<Vec<_>>()
//!     })
//!     .unwrap();
//!
//! assert_eq!(summary.trials, 48);
//! println!("best: {:?}", tuner.best().map(|r| space.point(r.index)));
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`ConfigSpace`](space::ConfigSpace) | A finite, indexable set of configurations. [`KnobSpace`](space::KnobSpace) is the built-in one. |
//! | [`FeatureExtractor`](feature::FeatureExtractor) | Turns a configuration into numbers for the model ([`FeatureKind`](feature::FeatureKind) picks a built-in). |
//! | [`CostModel`](model::CostModel) | Predicts mean and uncertainty; [`ForestCostModel`](model::ForestCostModel) by default. |
//! | [`ModelOptimizer`](optimizer::ModelOptimizer) | Searches for high-acquisition candidates; simulated annealing by default. |
//! | [`DiversityFilter`](diversity::DiversityFilter) | Thins an oversized shortlist to a spread-out plan. |
//! | [`Measurer`] | Compiles and times candidates; supplied by you. |
//! | [`Storage`](storage::Storage) | Append-only history of [`MeasurementRecord`](history::MeasurementRecord)s. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) | on |
//! | `serde` | `Serialize`/`Deserialize` on records, outcomes, [`TunerConfig`] | off |
//! | `journal` | [`JournalStorage`](storage::JournalStorage): JSONL history with file locking (enables `serde`) | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod diversity;
mod error;
pub mod feature;
pub mod history;
pub mod measure;
pub mod model;
pub mod optimizer;
pub mod pool;
mod rng_util;
pub mod space;
pub mod storage;
mod tuner;
mod types;

pub use error::{Error, Result};
pub use history::{MeasureResult, MeasurementRecord, Outcome};
pub use measure::{Measurer, Progress};
pub use tuner::{TuneSummary, Tuner, TunerBuilder, TunerConfig};
pub use types::{FailureKind, StopReason, TunerState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use autotuner::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{Acquisition, UncertaintySchedule};
    pub use crate::diversity::DiversityFilter;
    pub use crate::error::{Error, Result};
    pub use crate::feature::{FeatureExtractor, FeatureKind};
    pub use crate::history::{HistorySnapshot, MeasureResult, MeasurementRecord, Outcome};
    pub use crate::measure::{Measurer, Progress};
    pub use crate::model::{CostModel, ForestCostModel, Prediction};
    pub use crate::optimizer::{ModelOptimizer, SimulatedAnnealingOptimizer};
    pub use crate::space::{ConfigSpace, Knob, KnobSpace};
    #[cfg(feature = "journal")]
    pub use crate::storage::JournalStorage;
    pub use crate::storage::{MemoryStorage, Storage};
    pub use crate::tuner::{TuneSummary, Tuner, TunerBuilder, TunerConfig};
    pub use crate::types::{FailureKind, StopReason, TunerState};
}
