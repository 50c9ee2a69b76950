use std::collections::HashSet;

use autotuner::prelude::*;

use crate::test_spaces::{cube, measurer, unimodal};

#[test]
fn plans_are_nonempty_and_duplicate_free() {
    let space = cube(8, 3);
    let optimum = [5, 2, 6];
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(16)
        .num_threads(2)
        .seed(3)
        .build()
        .unwrap();

    let mut measured: Vec<usize> = Vec::new();
    let mut score = measurer(&space, |p| unimodal(p, &optimum));
    struct Recorder<'a, F> {
        inner: F,
        measured: &'a mut Vec<usize>,
    }
    impl<F: FnMut(&[usize]) -> Vec<MeasureResult>> Measurer for Recorder<'_, F> {
        fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
            self.measured.extend_from_slice(batch);
            (self.inner)(batch)
        }
    }

    let summary = tuner
        .tune(
            96,
            &mut Recorder {
                inner: &mut score,
                measured: &mut measured,
            },
        )
        .unwrap();

    assert_eq!(summary.trials, 96);
    assert_eq!(measured.len(), 96);
    let unique: HashSet<usize> = measured.iter().copied().collect();
    assert_eq!(unique.len(), 96, "a configuration was measured twice");
    assert!(measured.iter().all(|&i| i < space.len()));

    // Six plan boundaries: the last refit produced a fresh plan.
    assert_eq!(summary.refits, 6);
    let last = tuner.plan();
    assert!(!last.is_empty());
    let last_unique: HashSet<usize> = last.iter().copied().collect();
    assert_eq!(last_unique.len(), last.len());
    assert!(last.iter().all(|i| !unique.contains(i)));
}

#[test]
fn diversity_plans_have_plan_size_entries() {
    let space = cube(6, 3);
    let optimum = [1, 1, 4];
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(10)
        .diversity_filter_ratio(2.0)
        .num_threads(2)
        .seed(8)
        .build()
        .unwrap();

    let summary = tuner
        .tune(30, &mut measurer(&space, |p| unimodal(p, &optimum)))
        .unwrap();

    assert_eq!(summary.trials, 30);
    let plan = tuner.plan();
    assert_eq!(plan.len(), 10);
    let unique: HashSet<usize> = plan.iter().copied().collect();
    assert_eq!(unique.len(), 10);
}

#[test]
fn small_space_is_exhausted() {
    let space = cube(3, 2);
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(4)
        .num_threads(1)
        .seed(1)
        .build()
        .unwrap();

    let summary = tuner
        .tune(100, &mut measurer(&space, |p| unimodal(p, &[1, 1])))
        .unwrap();

    assert_eq!(summary.trials, 9);
    assert_eq!(summary.stop_reason, StopReason::SpaceExhausted);
    assert_eq!(tuner.history().len(), 9);
    let best = summary.best.unwrap();
    assert_eq!(space.point(best.index), vec![1, 1]);
}

#[test]
fn batches_smaller_than_plan() {
    let space = cube(5, 2);
    let mut sizes = Vec::new();
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(6)
        .batch_size(4)
        .num_threads(1)
        .seed(2)
        .build()
        .unwrap();

    let mut score = measurer(&space, |p| unimodal(p, &[0, 0]));
    tuner
        .tune(15, &mut |batch: &[usize]| {
            sizes.push(batch.len());
            score(batch)
        })
        .unwrap();

    assert_eq!(sizes, vec![4, 4, 4, 3]);
}
