use autotuner::prelude::*;

use crate::test_spaces::{cube, kth_best, measurer, unimodal};

const OPTIMUM: [i64; 3] = [6, 3, 8];

fn run(seed: u64) -> f64 {
    let space = cube(10, 3);
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(16)
        .num_threads(2)
        .log_interval(0)
        .seed(seed)
        .build()
        .unwrap();

    let summary = tuner
        .tune(200, &mut measurer(&space, |p| unimodal(p, &OPTIMUM)))
        .unwrap();
    assert_eq!(summary.trials, 200);
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);

    summary.best.and_then(|b| b.score()).unwrap()
}

#[test]
fn finds_top_one_percent_on_unimodal_space() {
    let space = cube(10, 3);
    let threshold = kth_best(&space, |p| unimodal(p, &OPTIMUM), 10);

    let hits = (0..10).filter(|&seed| run(seed) >= threshold).count();
    assert!(hits >= 9, "only {hits}/10 runs reached the top 1%");
}

#[test]
fn exploitation_only_still_converges() {
    let space = cube(10, 3);
    let threshold = kth_best(&space, |p| unimodal(p, &OPTIMUM), 10);
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(16)
        .uncertainty_aware(false)
        .feature_type(FeatureKind::Flattened)
        .num_threads(2)
        .seed(21)
        .build()
        .unwrap();

    let summary = tuner
        .tune(200, &mut measurer(&space, |p| unimodal(p, &OPTIMUM)))
        .unwrap();
    assert!(summary.best.and_then(|b| b.score()).unwrap() >= threshold);
}

#[test]
fn same_seed_same_run() {
    let space = cube(6, 3);
    let trace = |seed| {
        let mut tuner = Tuner::builder(space.clone())
            .plan_size(8)
            .num_threads(1)
            .seed(seed)
            .build()
            .unwrap();
        tuner
            .tune(32, &mut measurer(&space, |p| unimodal(p, &[2, 2, 2])))
            .unwrap();
        tuner
            .history()
            .records()
            .iter()
            .map(|r| r.index)
            .collect::<Vec<_>>()
    };
    assert_eq!(trace(4), trace(4));
}
