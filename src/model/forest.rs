//! Random-forest regression with per-tree spread as uncertainty.
//!
//! Each tree is grown on a bootstrap sample of the training rows, choosing
//! splits by variance reduction over a random `ceil(sqrt(d))` subset of the
//! features at every node. The forest predicts the mean of its trees and
//! reports their standard deviation as the uncertainty: trees agree near
//! measured configurations and disagree away from them.
//!
//! Trees are fitted in parallel on a [`WorkerPool`]. Every tree gets its own
//! seed drawn up front from the forest seed, so the fitted forest does not
//! depend on the number of worker threads.

use rayon::prelude::*;

use super::Prediction;
use crate::error::Result;
use crate::pool::WorkerPool;

/// Configuration for [`RandomForest`].
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees in the forest (default: 32).
    pub n_trees: usize,
    /// Maximum depth of each tree. `None` for unlimited (default: `None`).
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node (default: 2).
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node (default: 1).
    pub min_samples_leaf: usize,
    /// Random seed for reproducibility (default: `Some(42)`).
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 32,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: Some(42),
        }
    }
}

// --- Decision Tree ---

/// A node in the regression tree (arena-allocated, root at 0).
#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Count, sum and sum of squares of a set of targets.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: usize,
    sum: f64,
    sum_sq: f64,
}

#[allow(clippy::cast_precision_loss)]
impl Moments {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(Self::default(), |mut m, y| {
            m.push(y);
            m
        })
    }

    fn push(&mut self, y: f64) {
        self.n += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    fn without(self, part: Self) -> Self {
        Self {
            n: self.n - part.n,
            sum: self.sum - part.sum,
            sum_sq: self.sum_sq - part.sum_sq,
        }
    }

    fn mean(self) -> f64 {
        self.sum / self.n as f64
    }

    /// `sum^2 / n`; a split's variance reduction is the gain in this term.
    fn explained(self) -> f64 {
        self.sum * self.sum / self.n as f64
    }

    /// True when the spread is within rounding noise of the magnitudes.
    fn is_pure(self) -> bool {
        self.sum_sq - self.explained() <= PURITY_EPS * self.sum_sq
    }
}

/// Relative tolerance under which a node counts as constant and a split
/// gain counts as zero.
const PURITY_EPS: f64 = 1e-12;

/// The best axis-aligned cut found at a node.
#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// A regression decision tree.
#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Grow a tree over the bootstrap `rows` of `data`.
    ///
    /// Nodes are expanded from an explicit work list, so deep trees on
    /// large histories do not grow the call stack.
    fn build(
        data: &[Vec<f64>],
        targets: &[f64],
        rows: &[usize],
        config: &ForestConfig,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let mut nodes = vec![TreeNode::Leaf { value: 0.0 }];
        let mut pending = vec![(0, rows.to_vec(), 0)];
        let mut scratch = Vec::with_capacity(rows.len());

        while let Some((slot, rows, depth)) = pending.pop() {
            let moments = Moments::of(rows.iter().map(|&i| targets[i]));
            let splittable = rows.len() >= config.min_samples_split
                && config.max_depth.is_none_or(|d| depth < d)
                && !moments.is_pure();
            let split = if splittable {
                best_split(data, targets, &rows, moments, config, rng, &mut scratch)
            } else {
                None
            };

            let Some(split) = split else {
                nodes[slot] = TreeNode::Leaf {
                    value: moments.mean(),
                };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&i| data[i][split.feature] <= split.threshold);
            if left_rows.is_empty() || right_rows.is_empty() {
                // Midpoint of two adjacent floats rounded onto one side.
                nodes[slot] = TreeNode::Leaf {
                    value: moments.mean(),
                };
                continue;
            }

            let left = nodes.len();
            let right = left + 1;
            nodes.push(TreeNode::Leaf { value: 0.0 });
            nodes.push(TreeNode::Leaf { value: 0.0 });
            nodes[slot] = TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Predict by walking from the root. Missing features read as zero.
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(feature).copied().unwrap_or(0.0);
                    idx = if v <= threshold { left } else { right };
                }
            }
        }
    }
}

// --- Split Search ---

/// Finds the cut with the largest variance reduction over a random
/// `ceil(sqrt(d))` subset of the features.
///
/// Each candidate feature is sorted once and swept left to right with
/// running moments, so a node costs `O(n log n)` per feature. Cuts fall
/// only between distinct values and leave at least `min_samples_leaf` rows
/// on each side. Returns `None` when no cut reduces the variance.
#[allow(clippy::cast_precision_loss)]
fn best_split(
    data: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    node: Moments,
    config: &ForestConfig,
    rng: &mut fastrand::Rng,
    scratch: &mut Vec<(f64, f64)>,
) -> Option<Split> {
    let n_features = data[*rows.first()?].len();
    if n_features == 0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_features = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
    let min_leaf = config.min_samples_leaf.max(1);
    let min_gain = PURITY_EPS * node.sum_sq;

    let mut best: Option<Split> = None;
    for feature in partial_shuffle(n_features, max_features, rng) {
        scratch.clear();
        scratch.extend(rows.iter().map(|&i| (data[i][feature], targets[i])));
        scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = Moments::default();
        for pair in scratch.windows(2) {
            let ((x, y), (next_x, _)) = (pair[0], pair[1]);
            left.push(y);
            if next_x <= x || left.n < min_leaf || rows.len() - left.n < min_leaf {
                continue;
            }
            let gain = left.explained() + node.without(left).explained() - node.explained();
            if gain > min_gain && best.is_none_or(|b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold: f64::midpoint(x, next_x),
                    gain,
                });
            }
        }
    }
    best
}

/// Select `k` random indices from `0..n` using partial Fisher-Yates shuffle.
fn partial_shuffle(n: usize, k: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let k = k.min(n);
    for i in 0..k {
        let j = rng.usize(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

// --- Public API ---

/// An ensemble of bootstrap regression trees.
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on `data` (one row per sample, equal lengths) and
    /// `targets`, growing trees in parallel on `pool`.
    ///
    /// An empty `data` yields an empty forest that predicts
    /// [`Prediction::unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`](crate::Error::PoolClosed) if the pool
    /// has been closed.
    pub fn fit(
        data: &[Vec<f64>],
        targets: &[f64],
        config: &ForestConfig,
        pool: &WorkerPool,
    ) -> Result<Self> {
        let n_samples = data.len().min(targets.len());
        if n_samples == 0 || config.n_trees == 0 {
            return Ok(Self::default());
        }

        let mut rng = crate::rng_util::seeded(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| rng.u64(..)).collect();

        let trees = pool.install(|| {
            seeds
                .par_iter()
                .map(|&seed| {
                    let mut rng = fastrand::Rng::with_seed(seed);
                    let bootstrap: Vec<usize> =
                        (0..n_samples).map(|_| rng.usize(0..n_samples)).collect();
                    DecisionTree::build(data, targets, &bootstrap, config, &mut rng)
                })
                .collect::<Vec<_>>()
        })?;

        Ok(Self { trees })
    }

    /// Number of fitted trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Returns `true` if the forest has no trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Mean and standard deviation of the tree predictions at `x`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> Prediction {
        if self.trees.is_empty() {
            return Prediction::unknown();
        }
        let n = self.trees.len() as f64;
        let preds: Vec<f64> = self.trees.iter().map(|t| t.predict(x)).collect();
        let mean = preds.iter().sum::<f64>() / n;
        let var = preds.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        Prediction {
            mean,
            std: var.sqrt(),
        }
    }
}
