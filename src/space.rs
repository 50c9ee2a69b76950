//! Discrete configuration spaces.
//!
//! The tuner never looks inside a configuration: it only needs to know how
//! many points exist, how to draw one, how to take a local step from one,
//! and what knob values a point stands for (so feature extractors can turn
//! it into numbers). That contract is the [`ConfigSpace`] trait.
//!
//! [`KnobSpace`] is the reference implementation: the Cartesian product of
//! named knobs, each with a finite list of integer choices (tile sizes,
//! unroll factors, loop orders encoded as ids, ...). Points are numbered in
//! mixed radix with the first knob varying fastest.
//!
//! ```
//! use autotuner::space::{ConfigSpace, Knob, KnobSpace};
//!
//! let space = KnobSpace::new(vec![
//!     Knob::new("tile_x", vec![1, 2, 4, 8]),
//!     Knob::new("tile_y", vec![1, 2, 4, 8]),
//!     Knob::new("unroll", vec![0, 1]),
//! ])
//! .unwrap();
//!
//! assert_eq!(space.len(), 32);
//! assert_eq!(space.point(5), vec![2, 2, 0]);
//! ```

use crate::error::{Error, Result};

/// A finite, indexable space of discrete configurations.
///
/// Indices run over `0..len()`. Implementations must be `Send + Sync`
/// because feature extraction reads the space from worker threads.
pub trait ConfigSpace: Send + Sync {
    /// Total number of configurations.
    fn len(&self) -> usize;

    /// Returns `true` if the space has no configurations.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of choices per knob.
    fn dims(&self) -> Vec<usize>;

    /// The knob values of the configuration at `index`.
    fn point(&self, index: usize) -> Vec<i64>;

    /// Position of each knob's value within its choice list, parallel to
    /// [`dims`](Self::dims) and consistent with [`point`](Self::point).
    ///
    /// Index numbering is up to the implementation; callers must use this
    /// rather than decode `index` themselves.
    fn choice_positions(&self, index: usize) -> Vec<usize>;

    /// Draw a configuration uniformly at random.
    ///
    /// # Panics
    ///
    /// Panics if the space is empty.
    fn sample(&self, rng: &mut fastrand::Rng) -> usize {
        rng.usize(0..self.len())
    }

    /// Propose a random local move away from `index`.
    ///
    /// Returns `index` itself only when no move exists.
    fn neighbor(&self, index: usize, rng: &mut fastrand::Rng) -> usize;
}

/// A single tunable knob with a finite list of integer choices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Knob {
    name: String,
    choices: Vec<i64>,
}

impl Knob {
    /// Creates a knob from an explicit list of choices.
    #[must_use]
    pub fn new(name: impl Into<String>, choices: impl Into<Vec<i64>>) -> Self {
        Self {
            name: name.into(),
            choices: choices.into(),
        }
    }

    /// Creates a knob whose choices are every integer in `low..=high`.
    #[must_use]
    pub fn range(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self::new(name, (low..=high).collect::<Vec<_>>())
    }

    /// The knob's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The knob's choices.
    #[must_use]
    pub fn choices(&self) -> &[i64] {
        &self.choices
    }

    /// Number of choices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Returns `true` if the knob has no choices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// Cartesian product of [`Knob`]s, numbered in mixed radix.
#[derive(Clone, Debug)]
pub struct KnobSpace {
    knobs: Vec<Knob>,
    strides: Vec<usize>,
    len: usize,
}

impl KnobSpace {
    /// Builds a space from its knobs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySpace`] if there are no knobs or any knob has
    /// no choices, and [`Error::SpaceTooLarge`] if the number of points
    /// overflows `usize`.
    pub fn new(knobs: Vec<Knob>) -> Result<Self> {
        if knobs.is_empty() || knobs.iter().any(Knob::is_empty) {
            return Err(Error::EmptySpace);
        }

        let mut strides = Vec::with_capacity(knobs.len());
        let mut len: usize = 1;
        for knob in &knobs {
            strides.push(len);
            len = len.checked_mul(knob.len()).ok_or(Error::SpaceTooLarge)?;
        }

        Ok(Self {
            knobs,
            strides,
            len,
        })
    }

    /// The knobs in index order.
    #[must_use]
    pub fn knobs(&self) -> &[Knob] {
        &self.knobs
    }

    /// Per-knob choice positions of the configuration at `index`.
    #[must_use]
    pub fn choice_indices(&self, index: usize) -> Vec<usize> {
        self.knobs
            .iter()
            .zip(&self.strides)
            .map(|(knob, &stride)| (index / stride) % knob.len())
            .collect()
    }

    /// Inverse of [`choice_indices`](Self::choice_indices).
    ///
    /// # Errors
    ///
    /// Returns [`Error::KnobDimensionMismatch`] if `choices` does not have one
    /// entry per knob, and [`Error::ChoiceOutOfRange`] if an entry exceeds
    /// its knob's number of choices.
    pub fn index_of(&self, choices: &[usize]) -> Result<usize> {
        if choices.len() != self.knobs.len() {
            return Err(Error::KnobDimensionMismatch {
                expected: self.knobs.len(),
                got: choices.len(),
            });
        }
        let mut index = 0;
        for (knob_idx, ((&choice, knob), &stride)) in
            choices.iter().zip(&self.knobs).zip(&self.strides).enumerate()
        {
            if choice >= knob.len() {
                return Err(Error::ChoiceOutOfRange {
                    knob: knob_idx,
                    choice,
                    n_choices: knob.len(),
                });
            }
            index += choice * stride;
        }
        Ok(index)
    }
}

impl ConfigSpace for KnobSpace {
    fn len(&self) -> usize {
        self.len
    }

    fn dims(&self) -> Vec<usize> {
        self.knobs.iter().map(Knob::len).collect()
    }

    fn point(&self, index: usize) -> Vec<i64> {
        self.knobs
            .iter()
            .zip(&self.strides)
            .map(|(knob, &stride)| knob.choices[(index / stride) % knob.len()])
            .collect()
    }

    fn choice_positions(&self, index: usize) -> Vec<usize> {
        self.choice_indices(index)
    }

    fn neighbor(&self, index: usize, rng: &mut fastrand::Rng) -> usize {
        let movable: Vec<usize> = (0..self.knobs.len())
            .filter(|&k| self.knobs[k].len() > 1)
            .collect();
        if movable.is_empty() {
            return index;
        }

        let k = movable[rng.usize(0..movable.len())];
        let n = self.knobs[k].len();
        let stride = self.strides[k];
        let current = (index / stride) % n;

        // Uniform over the other n - 1 choices.
        let mut next = rng.usize(0..n - 1);
        if next >= current {
            next += 1;
        }

        index - current * stride + next * stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> KnobSpace {
        KnobSpace::new(vec![
            Knob::new("a", vec![1, 2, 4]),
            Knob::new("b", vec![8, 16]),
            Knob::range("c", 0, 4),
        ])
        .unwrap()
    }

    #[test]
    fn len_is_product_of_choices() {
        assert_eq!(space().len(), 30);
        assert_eq!(space().dims(), vec![3, 2, 5]);
    }

    #[test]
    fn first_knob_varies_fastest() {
        let s = space();
        assert_eq!(s.point(0), vec![1, 8, 0]);
        assert_eq!(s.point(1), vec![2, 8, 0]);
        assert_eq!(s.point(3), vec![1, 16, 0]);
        assert_eq!(s.point(6), vec![1, 8, 1]);
        assert_eq!(s.point(29), vec![4, 16, 4]);
    }

    #[test]
    fn choice_positions_select_the_point() {
        let s = space();
        for index in 0..s.len() {
            let positions = s.choice_positions(index);
            let chosen: Vec<i64> = s
                .knobs()
                .iter()
                .zip(&positions)
                .map(|(knob, &pos)| knob.choices()[pos])
                .collect();
            assert_eq!(chosen, s.point(index), "index {index}");
        }
    }

    #[test]
    fn index_of_inverts_choice_indices() {
        let s = space();
        for i in 0..s.len() {
            assert_eq!(s.index_of(&s.choice_indices(i)).unwrap(), i);
        }
    }

    #[test]
    fn index_of_rejects_bad_input() {
        let s = space();
        assert!(matches!(
            s.index_of(&[0, 0]),
            Err(Error::KnobDimensionMismatch {
                expected: 3,
                got: 2
            })
        ));
        assert!(matches!(
            s.index_of(&[0, 2, 0]),
            Err(Error::ChoiceOutOfRange { knob: 1, .. })
        ));
    }

    #[test]
    fn neighbor_changes_exactly_one_knob() {
        let s = space();
        let mut rng = fastrand::Rng::with_seed(7);
        for i in 0..s.len() {
            for _ in 0..10 {
                let j = s.neighbor(i, &mut rng);
                assert!(j < s.len());
                let a = s.choice_indices(i);
                let b = s.choice_indices(j);
                let changed = a.iter().zip(&b).filter(|(x, y)| x != y).count();
                assert_eq!(changed, 1, "{i} -> {j}");
            }
        }
    }

    #[test]
    fn neighbor_of_fixed_space_is_identity() {
        let s = KnobSpace::new(vec![Knob::new("a", vec![3]), Knob::new("b", vec![5])]).unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.neighbor(0, &mut rng), 0);
    }

    #[test]
    fn empty_knobs_are_rejected() {
        assert!(matches!(KnobSpace::new(vec![]), Err(Error::EmptySpace)));
        assert!(matches!(
            KnobSpace::new(vec![Knob::new("a", Vec::<i64>::new())]),
            Err(Error::EmptySpace)
        ));
    }

    #[test]
    fn overflowing_space_is_rejected() {
        let knobs = (0..80).map(|i| Knob::range(format!("k{i}"), 0, 3)).collect();
        assert!(matches!(KnobSpace::new(knobs), Err(Error::SpaceTooLarge)));
    }
}
