//! Acquisition scoring: how the optimizer ranks candidates.
//!
//! With uncertainty-aware search disabled the score is the model's point
//! prediction (pure exploitation). With it enabled the score is
//!
//! ```text
//! score = mean + w(n) · bonus(mean, std, best)
//! bonus = EI(mean, std, best) - max(mean - best, 0)
//! ```
//!
//! `bonus` is the part of Expected Improvement owed to uncertainty alone:
//! it is zero for a perfectly certain prediction and grows with `std`.
//! `w(n)` comes from an [`UncertaintySchedule`] and halves every
//! `half_life` successful measurements, so early plans explore and later
//! plans converge to the point prediction. Locality enters through `std`
//! itself: the forest's spread shrinks around configurations that have
//! been measured.

use crate::error::{Error, Result};
use crate::model::Prediction;

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz-Stegun rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let pdf = norm_pdf(abs_x);
    let cdf = 1.0 - pdf * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// Expected Improvement over `best` for a maximization problem.
///
/// `EI(x) = (mean - best) Φ(z) + std φ(z)` where `z = (mean - best) / std`.
#[must_use]
pub fn expected_improvement(mean: f64, std: f64, best: f64) -> f64 {
    if std < 1e-12 {
        return (mean - best).max(0.0);
    }
    let z = (mean - best) / std;
    let improvement = (mean - best) * norm_cdf(z) + std * norm_pdf(z);
    improvement.max(0.0)
}

/// How much weight the uncertainty term gets as measurements accumulate.
///
/// `weight(n) = initial_weight · 0.5^(n / half_life)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UncertaintySchedule {
    initial_weight: f64,
    half_life: usize,
}

impl UncertaintySchedule {
    /// Creates a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHalfLife`] if `half_life` is zero.
    pub fn new(initial_weight: f64, half_life: usize) -> Result<Self> {
        if half_life == 0 {
            return Err(Error::InvalidHalfLife);
        }
        Ok(Self {
            initial_weight: initial_weight.max(0.0),
            half_life,
        })
    }

    /// Weight after `n_measured` successful measurements.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn weight(&self, n_measured: usize) -> f64 {
        self.initial_weight * 0.5_f64.powf(n_measured as f64 / self.half_life as f64)
    }

    /// Number of measurements after which the weight has halved.
    #[must_use]
    pub fn half_life(&self) -> usize {
        self.half_life
    }
}

/// Which acquisition function ranks candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// The model's mean prediction.
    Mean,
    /// Mean plus a weighted Expected-Improvement uncertainty bonus.
    ExpectedImprovement,
}

/// An acquisition function frozen for one planning cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Acquisition {
    mode: AcquisitionMode,
    incumbent: f64,
    weight: f64,
}

impl Acquisition {
    /// Pure exploitation: rank by predicted mean.
    #[must_use]
    pub fn mean() -> Self {
        Self {
            mode: AcquisitionMode::Mean,
            incumbent: 0.0,
            weight: 0.0,
        }
    }

    /// Uncertainty-aware scoring against `incumbent`, the best normalized
    /// score seen so far, with the bonus scaled by `weight`.
    #[must_use]
    pub fn expected_improvement(incumbent: f64, weight: f64) -> Self {
        Self {
            mode: AcquisitionMode::ExpectedImprovement,
            incumbent,
            weight: weight.max(0.0),
        }
    }

    /// The scoring mode.
    #[must_use]
    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    /// The weight on the uncertainty bonus.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The best normalized score the bonus is measured against.
    #[must_use]
    pub fn incumbent(&self) -> f64 {
        self.incumbent
    }

    /// How much of the score is owed to uncertainty.
    #[must_use]
    pub fn uncertainty_contribution(&self, prediction: &Prediction) -> f64 {
        match self.mode {
            AcquisitionMode::Mean => 0.0,
            AcquisitionMode::ExpectedImprovement => {
                let ei = expected_improvement(prediction.mean, prediction.std, self.incumbent);
                let bonus = (ei - (prediction.mean - self.incumbent).max(0.0)).max(0.0);
                self.weight * bonus
            }
        }
    }

    /// Score a single prediction; higher is better.
    #[must_use]
    pub fn score(&self, prediction: &Prediction) -> f64 {
        prediction.mean + self.uncertainty_contribution(prediction)
    }

    /// Score a batch of predictions.
    #[must_use]
    pub fn score_all(&self, predictions: &[Prediction]) -> Vec<f64> {
        predictions.iter().map(|p| self.score(p)).collect()
    }
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::mean()
    }
}
