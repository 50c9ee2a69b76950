//! Measurement outcomes and the append-only history.

use core::time::Duration;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::FailureKind;

/// The result of measuring one configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Outcome {
    /// The candidate ran; `score` is a normalized performance figure where
    /// higher is better (e.g. achieved GFLOP/s).
    Success {
        /// Observed score.
        score: f64,
    },
    /// The candidate could not be measured.
    Failure {
        /// Failure category.
        kind: FailureKind,
        /// Free-form detail from the measurer.
        message: String,
    },
}

impl Outcome {
    /// The observed score, or `None` for a failure.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Success { score } => Some(*score),
            Self::Failure { .. } => None,
        }
    }

    /// Returns `true` for a successful measurement with a finite score.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.score().is_some_and(f64::is_finite)
    }
}

/// What a [`Measurer`](crate::Measurer) returns for each candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureResult {
    /// Score or failure marker.
    pub outcome: Outcome,
    /// Wall-clock cost of the measurement (compile + run).
    pub cost: Duration,
}

impl MeasureResult {
    /// A successful measurement.
    #[must_use]
    pub fn success(score: f64, cost: Duration) -> Self {
        Self {
            outcome: Outcome::Success { score },
            cost,
        }
    }

    /// A failed measurement.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>, cost: Duration) -> Self {
        Self {
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
            cost,
        }
    }
}

/// One entry of the tuning history.
///
/// Records are created once by the tuner and never modified; the history
/// only grows.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementRecord {
    /// Position in the history (0-based, monotonically increasing).
    pub id: u64,
    /// Index of the configuration in its space.
    pub index: usize,
    /// Feature vector the cost model saw for this configuration.
    pub features: Arc<[f64]>,
    /// Score or failure marker.
    pub outcome: Outcome,
    /// Measurement cost.
    pub cost: Duration,
}

impl MeasurementRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(
        id: u64,
        index: usize,
        features: Arc<[f64]>,
        outcome: Outcome,
        cost: Duration,
    ) -> Self {
        Self {
            id,
            index,
            features,
            outcome,
            cost,
        }
    }

    /// The observed score, or `None` for a failure.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.outcome.score()
    }
}

/// A consistent, immutable view of the history at some point in time.
///
/// The version is the number of records it contains; later appends to the
/// history are not visible through an existing snapshot.
#[derive(Clone, Debug, Default)]
pub struct HistorySnapshot {
    records: Vec<Arc<MeasurementRecord>>,
}

impl HistorySnapshot {
    /// Wraps shared records.
    #[must_use]
    pub fn new(records: Vec<Arc<MeasurementRecord>>) -> Self {
        Self { records }
    }

    /// Builds a snapshot from owned records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = MeasurementRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of records, which doubles as the snapshot version.
    #[must_use]
    pub fn version(&self) -> usize {
        self.records.len()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[Arc<MeasurementRecord>] {
        &self.records
    }

    /// Records with a finite score, in insertion order.
    pub fn successes(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.records
            .iter()
            .map(AsRef::as_ref)
            .filter(|r| r.outcome.is_success())
    }

    /// The best successful record (first one wins on ties).
    #[must_use]
    pub fn best(&self) -> Option<&MeasurementRecord> {
        self.successes().fold(None, |best, r| match best {
            Some(b) if b.score() >= r.score() => Some(b),
            _ => Some(r),
        })
    }
}
