//! Feature extraction strategies.
//!
//! A feature extractor turns a configuration index into a numeric vector the
//! cost model can regress on. Three strategies ship with the crate and are
//! selected by [`FeatureKind`]:
//!
//! | Kind | Aliases | Trade-off |
//! |------|---------|-----------|
//! | [`Structural`](FeatureKind::Structural) | `structural`, `itervar` | Most accurate for a single task; log-scaled loop extents |
//! | [`Flattened`](FeatureKind::Flattened) | `flattened`, `knob` | Fastest; raw knob values |
//! | [`SampledRelation`](FeatureKind::SampledRelation) | `sampled-relation`, `curve` | Fixed length, transfers across spaces |
//!
//! Custom strategies implement [`FeatureExtractor`] and are passed to
//! [`TunerBuilder::feature_extractor`](crate::TunerBuilder::feature_extractor).

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::space::ConfigSpace;

/// The built-in feature extraction strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FeatureKind {
    /// Loop-variable style features: log-scaled knob values, normalized
    /// choice positions and cumulative extents.
    #[default]
    Structural,
    /// The knob values themselves.
    Flattened,
    /// A fixed-length curve sampled from the cumulative extent relation.
    SampledRelation,
}

impl FeatureKind {
    /// The canonical name of this strategy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Flattened => "flattened",
            Self::SampledRelation => "sampled-relation",
        }
    }

    /// Instantiate the built-in extractor for this kind.
    #[must_use]
    pub fn extractor(self) -> Arc<dyn FeatureExtractor> {
        match self {
            Self::Structural => Arc::new(StructuralFeatures),
            Self::Flattened => Arc::new(FlattenedFeatures),
            Self::SampledRelation => Arc::new(SampledRelationFeatures::default()),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" | "itervar" => Ok(Self::Structural),
            "flattened" | "knob" => Ok(Self::Flattened),
            "sampled-relation" | "curve" => Ok(Self::SampledRelation),
            other => Err(Error::UnknownFeatureKind(other.to_string())),
        }
    }
}

/// Maps a configuration to a feature vector.
///
/// Extraction runs on the cost model's worker pool, so implementations must
/// be `Send + Sync` and free of shared mutable state. The returned vectors
/// do not need to have the same length for every configuration; the model
/// zero-pads shorter ones.
pub trait FeatureExtractor: Send + Sync {
    /// Which strategy this is. Custom extractors report the closest kind.
    fn kind(&self) -> FeatureKind;

    /// Extract the feature vector of the configuration at `index`.
    fn extract(&self, space: &dyn ConfigSpace, index: usize) -> Vec<f64>;
}

/// Raw knob values.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlattenedFeatures;

impl FeatureExtractor for FlattenedFeatures {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Flattened
    }

    #[allow(clippy::cast_precision_loss)]
    fn extract(&self, space: &dyn ConfigSpace, index: usize) -> Vec<f64> {
        space.point(index).into_iter().map(|v| v as f64).collect()
    }
}

/// Log-scaled knob values, normalized choice positions and the running
/// log-extent of the nest formed by the knobs in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralFeatures;

impl FeatureExtractor for StructuralFeatures {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Structural
    }

    #[allow(clippy::cast_precision_loss)]
    fn extract(&self, space: &dyn ConfigSpace, index: usize) -> Vec<f64> {
        let point = space.point(index);
        let dims = space.dims();
        let n = point.len();

        let mut features = Vec::with_capacity(3 * n);
        features.extend(point.iter().map(|&v| log_extent(v)));

        let positions = space.choice_positions(index);
        features.extend(dims.iter().enumerate().map(|(k, &d)| {
            match positions.get(k) {
                Some(&pos) if d > 1 => pos as f64 / (d - 1) as f64,
                _ => 0.0,
            }
        }));

        let mut acc = 0.0;
        for &v in &point {
            acc += log_extent(v);
            features.push(acc);
        }
        features
    }
}

/// A fixed-length curve: the cumulative log-extent relation of the knobs,
/// resampled at `n_samples` evenly spaced points by linear interpolation.
#[derive(Clone, Copy, Debug)]
pub struct SampledRelationFeatures {
    n_samples: usize,
}

impl SampledRelationFeatures {
    /// Creates an extractor that samples `n_samples` points (at least 2).
    #[must_use]
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples: n_samples.max(2),
        }
    }

    /// Number of points sampled from the curve.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}

impl Default for SampledRelationFeatures {
    fn default() -> Self {
        Self::new(16)
    }
}

impl FeatureExtractor for SampledRelationFeatures {
    fn kind(&self) -> FeatureKind {
        FeatureKind::SampledRelation
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn extract(&self, space: &dyn ConfigSpace, index: usize) -> Vec<f64> {
        // Curve knots: 0 followed by the running log-extent after each knob.
        let mut knots = Vec::with_capacity(space.dims().len() + 1);
        knots.push(0.0);
        let mut acc = 0.0;
        for v in space.point(index) {
            acc += log_extent(v);
            knots.push(acc);
        }

        let last = (knots.len() - 1) as f64;
        (0..self.n_samples)
            .map(|i| {
                let x = last * i as f64 / (self.n_samples - 1) as f64;
                let lo = x.floor() as usize;
                let hi = (lo + 1).min(knots.len() - 1);
                let t = x - lo as f64;
                knots[lo] * (1.0 - t) + knots[hi] * t
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn log_extent(v: i64) -> f64 {
    (1.0 + v.unsigned_abs() as f64).log2()
}
