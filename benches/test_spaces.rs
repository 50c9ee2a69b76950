//! Synthetic tuning spaces and measurers for tests and benchmarks.

use core::time::Duration;

use autotuner::prelude::*;

/// A cube of `n^dims` points; every knob takes the values `0..n`.
pub fn cube(n: i64, dims: usize) -> KnobSpace {
    KnobSpace::new(
        (0..dims)
            .map(|d| Knob::range(format!("k{d}"), 0, n - 1))
            .collect(),
    )
    .unwrap()
}

/// Unimodal score: `100 - ||p - optimum||^2`. Higher is better.
pub fn unimodal(point: &[i64], optimum: &[i64]) -> f64 {
    let d2: i64 = point
        .iter()
        .zip(optimum)
        .map(|(a, b)| (a - b).pow(2))
        .sum();
    100.0 - d2 as f64
}

/// Smooth, non-separable score in roughly `[0, 3]`.
pub fn smooth(point: &[i64]) -> f64 {
    let x: Vec<f64> = point.iter().map(|&v| v as f64 / 10.0).collect();
    let a = x.first().copied().unwrap_or(0.0);
    let b = x.get(1).copied().unwrap_or(0.0);
    let c = x.get(2).copied().unwrap_or(0.0);
    (a * std::f64::consts::PI).sin() + (1.0 - (b - 0.3).powi(2)) + a * c
}

/// A measurer that scores every point with `score` and never fails.
pub fn measurer<'a>(
    space: &'a KnobSpace,
    score: impl Fn(&[i64]) -> f64 + 'a,
) -> impl FnMut(&[usize]) -> Vec<MeasureResult> + 'a {
    move |batch: &[usize]| {
        batch
            .iter()
            .map(|&i| MeasureResult::success(score(&space.point(i)), Duration::from_micros(10)))
            .collect()
    }
}

/// A measurer whose every measurement fails to compile.
pub fn always_failing(batch: &[usize]) -> Vec<MeasureResult> {
    batch
        .iter()
        .map(|_| MeasureResult::failure(FailureKind::CompileError, "no kernel", Duration::ZERO))
        .collect()
}

/// The `k`-th best score over the whole space.
pub fn kth_best(space: &KnobSpace, score: impl Fn(&[i64]) -> f64, k: usize) -> f64 {
    let mut scores: Vec<f64> = (0..space.len()).map(|i| score(&space.point(i))).collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    scores[k.saturating_sub(1).min(scores.len() - 1)]
}
