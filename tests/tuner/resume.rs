use std::collections::HashSet;

use autotuner::prelude::*;

use crate::test_spaces::{cube, measurer, unimodal};

const OPTIMUM: [i64; 3] = [4, 1, 6];

fn first_run(space: &KnobSpace) -> (Vec<MeasurementRecord>, f64) {
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(8)
        .num_threads(1)
        .seed(30)
        .build()
        .unwrap();
    let summary = tuner
        .tune(32, &mut measurer(space, |p| unimodal(p, &OPTIMUM)))
        .unwrap();
    let records = tuner
        .history()
        .records()
        .iter()
        .map(|r| MeasurementRecord::clone(r))
        .collect();
    (records, summary.best.and_then(|b| b.score()).unwrap())
}

#[test]
fn loaded_history_is_not_measured_again() {
    let space = cube(8, 3);
    let (records, old_best) = first_run(&space);
    let old: HashSet<usize> = records.iter().map(|r| r.index).collect();

    let mut tuner = Tuner::builder(space.clone())
        .plan_size(8)
        .num_threads(1)
        .seed(31)
        .build()
        .unwrap();
    tuner.load_history(records).unwrap();
    assert_eq!(tuner.n_trials(), 32);
    assert!((tuner.best().unwrap().score().unwrap() - old_best).abs() < 1e-12);

    let mut measured = Vec::new();
    let mut score = measurer(&space, |p| unimodal(p, &OPTIMUM));
    let summary = tuner
        .tune(24, &mut |batch: &[usize]| {
            measured.extend_from_slice(batch);
            score(batch)
        })
        .unwrap();

    assert_eq!(summary.trials, 24);
    // The initial refit on loaded history counts.
    assert_eq!(summary.refits, 4);
    assert!(measured.iter().all(|i| !old.contains(i)));
    assert_eq!(tuner.n_trials(), 56);
    assert!(summary.best.and_then(|b| b.score()).unwrap() >= old_best);

    let ids: Vec<u64> = tuner.history().records().iter().map(|r| r.id).collect();
    assert!(ids.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn preloaded_storage_counts_as_history() {
    let space = cube(8, 3);
    let (records, old_best) = first_run(&space);

    let tuner = Tuner::builder(space)
        .storage(MemoryStorage::with_records(records))
        .plan_size(8)
        .num_threads(1)
        .build()
        .unwrap();

    assert_eq!(tuner.n_trials(), 32);
    assert!((tuner.best().unwrap().score().unwrap() - old_best).abs() < 1e-12);
}

#[test]
fn foreign_history_only_warm_starts() {
    let small = cube(4, 2);
    let mut donor = Tuner::builder(small.clone())
        .plan_size(4)
        .num_threads(1)
        .seed(2)
        .build()
        .unwrap();
    donor
        .tune(8, &mut measurer(&small, |p| unimodal(p, &[1, 2])))
        .unwrap();
    let records: Vec<MeasurementRecord> = donor
        .history()
        .records()
        .iter()
        .map(|r| MeasurementRecord::clone(r))
        .collect();

    let space = cube(8, 3);
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(8)
        .num_threads(1)
        .seed(3)
        .build()
        .unwrap();
    tuner.load_history(records).unwrap();

    // Different knob count, so no stored feature vector matches this space.
    assert_eq!(tuner.n_trials(), 8);
    assert!(tuner.best().is_none());

    let summary = tuner
        .tune(16, &mut measurer(&space, |p| unimodal(p, &OPTIMUM)))
        .unwrap();
    assert_eq!(summary.trials, 16);
    assert!(summary.best.is_some());
}
