//! Diversity filtering of an oversized shortlist.
//!
//! When enabled, the optimizer is asked for `ceil(plan_size * ratio)`
//! candidates and [`DiversityFilter::select`] keeps `plan_size` of them that
//! score well without crowding into one region of feature space.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Distances below this are treated as zero.
const MIN_THRESHOLD: f64 = 1e-12;

/// Greedy score-ordered selection with a shrinking distance threshold.
///
/// Features are min-max normalized per dimension. Candidates are visited
/// best score first; a candidate is taken if its distance to every selected
/// one is at least the threshold. The threshold starts at the median
/// pairwise distance of the shortlist and halves whenever no remaining
/// candidate qualifies, so the selection always fills up.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use autotuner::diversity::DiversityFilter;
///
/// let filter = DiversityFilter::new(2.0).unwrap();
/// assert_eq!(filter.shortlist_size(5), 10);
///
/// // Two tight clusters; the filter takes one from each before doubling up.
/// let shortlist = [10, 11, 12, 20, 21];
/// let scores = [0.9, 0.8, 0.7, 0.6, 0.5];
/// let features: Vec<Arc<[f64]>> = [0.0, 0.1, 0.2, 10.0, 10.1]
///     .iter()
///     .map(|&x| Arc::from(vec![x]))
///     .collect();
/// assert_eq!(filter.select(&shortlist, &scores, &features, 2), vec![10, 20]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiversityFilter {
    ratio: f64,
}

impl DiversityFilter {
    /// Creates a filter that shortlists `ratio` times the plan size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDiversityRatio`] unless `ratio` is a finite
    /// number greater than 1.
    pub fn new(ratio: f64) -> Result<Self> {
        if !ratio.is_finite() || ratio <= 1.0 {
            return Err(Error::InvalidDiversityRatio(ratio));
        }
        Ok(Self { ratio })
    }

    /// The shortlist ratio.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// How many candidates to request from the optimizer for a plan of
    /// `plan_size`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn shortlist_size(&self, plan_size: usize) -> usize {
        (plan_size as f64 * self.ratio).ceil() as usize
    }

    /// Pick `min(k, distinct shortlist entries)` members of `shortlist`.
    ///
    /// `scores` and `features` are parallel to `shortlist`; missing
    /// entries count as score `-inf` and an empty feature vector. The first
    /// pick is always the best-scoring candidate.
    #[must_use]
    pub fn select(
        &self,
        shortlist: &[usize],
        scores: &[f64],
        features: &[Arc<[f64]>],
        k: usize,
    ) -> Vec<usize> {
        // Keep the first occurrence of each index.
        let mut positions: Vec<usize> = Vec::with_capacity(shortlist.len());
        for (pos, index) in shortlist.iter().enumerate() {
            if !shortlist[..pos].contains(index) {
                positions.push(pos);
            }
        }
        let k = k.min(positions.len());
        if k == 0 {
            return Vec::new();
        }

        let score = |pos: usize| scores.get(pos).copied().unwrap_or(f64::NEG_INFINITY);
        positions.sort_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)));

        let points = normalize(&positions, features);
        let mut threshold = median_pairwise_distance(&points);

        let mut taken = vec![false; points.len()];
        let mut selected: Vec<usize> = Vec::with_capacity(k);
        taken[0] = true;
        selected.push(0);

        while selected.len() < k {
            let next = (0..points.len()).find(|&c| {
                !taken[c]
                    && selected
                        .iter()
                        .all(|&s| distance(&points[c], &points[s]) >= threshold)
            });
            match next {
                Some(c) => {
                    taken[c] = true;
                    selected.push(c);
                }
                None if threshold > MIN_THRESHOLD => threshold /= 2.0,
                None => threshold = 0.0,
            }
        }

        selected
            .into_iter()
            .map(|c| shortlist[positions[c]])
            .collect()
    }
}

/// Min-max normalized feature rows, zero-padded to a common length.
fn normalize(positions: &[usize], features: &[Arc<[f64]>]) -> Vec<Vec<f64>> {
    let rows: Vec<&[f64]> = positions
        .iter()
        .map(|&p| features.get(p).map_or(&[][..], |f| &f[..]))
        .collect();
    let dim = rows.iter().map(|r| r.len()).max().unwrap_or(0);

    let mut lo = vec![f64::INFINITY; dim];
    let mut hi = vec![f64::NEG_INFINITY; dim];
    for row in &rows {
        for d in 0..dim {
            let v = row.get(d).copied().unwrap_or(0.0);
            lo[d] = lo[d].min(v);
            hi[d] = hi[d].max(v);
        }
    }

    rows.iter()
        .map(|row| {
            (0..dim)
                .map(|d| {
                    let range = hi[d] - lo[d];
                    if range > 0.0 {
                        (row.get(d).copied().unwrap_or(0.0) - lo[d]) / range
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn median_pairwise_distance(points: &[Vec<f64>]) -> f64 {
    let mut dists = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            dists.push(distance(&points[i], &points[j]));
        }
    }
    if dists.is_empty() {
        return 0.0;
    }
    dists.sort_by(f64::total_cmp);
    dists[dists.len() / 2]
}
