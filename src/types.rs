//! Core types shared across the tuner.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a measurement did not produce a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FailureKind {
    /// The candidate failed to compile.
    CompileError,
    /// The candidate compiled but crashed or produced wrong results.
    RuntimeError,
    /// The configuration is not valid for the target.
    InvalidConfig,
    /// The measurement exceeded its time limit.
    Timeout,
}

/// The phase of the tuning loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TunerState {
    /// No tuning has started yet.
    Idle,
    /// Refitting the cost model and proposing the next plan.
    Planning,
    /// A batch has been handed to the measurer.
    AwaitingMeasurement,
    /// Folding measurement results into history.
    Updating,
    /// The loop has stopped.
    Done,
}

/// Why [`Tuner::tune`](crate::Tuner::tune) returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopReason {
    /// The trial budget was used up.
    BudgetExhausted,
    /// Every configuration in the space has been measured.
    SpaceExhausted,
    /// No improvement within the early-stopping window.
    EarlyStopped,
    /// A measurer hook asked the loop to stop.
    Cancelled,
}
