use autotuner::prelude::*;

use crate::test_spaces::{cube, measurer, unimodal};

fn tuner(space: &KnobSpace) -> Tuner {
    Tuner::builder(space.clone())
        .plan_size(4)
        .num_threads(3)
        .seed(0)
        .build()
        .unwrap()
}

#[test]
fn tune_releases_the_pool() {
    let space = cube(4, 3);
    let mut t = tuner(&space);
    assert!(!t.is_closed());

    t.tune(8, &mut measurer(&space, |p| unimodal(p, &[0, 0, 0])))
        .unwrap();

    assert!(t.is_closed());
    assert_eq!(t.state(), TunerState::Done);
    // Results stay readable after teardown.
    assert_eq!(t.history().len(), 8);
    assert!(t.best().is_some());
}

#[test]
fn use_after_teardown_is_an_error() {
    let space = cube(4, 3);
    let mut t = tuner(&space);
    t.tune(4, &mut measurer(&space, |p| unimodal(p, &[1, 1, 1])))
        .unwrap();

    let again = t.tune(4, &mut measurer(&space, |p| unimodal(p, &[1, 1, 1])));
    assert!(matches!(again, Err(Error::PoolClosed)));
    assert!(matches!(t.load_history(Vec::new()), Err(Error::PoolClosed)));
    assert_eq!(t.history().len(), 4);
}

#[test]
fn explicit_close_is_idempotent() {
    let space = cube(4, 3);
    let mut t = tuner(&space);
    t.close().unwrap();
    t.close().unwrap();
    assert!(t.is_closed());
    assert!(matches!(
        t.tune(4, &mut measurer(&space, |p| unimodal(p, &[1, 1, 1]))),
        Err(Error::PoolClosed)
    ));
}

#[test]
fn closed_cost_model_rejects_fit_and_predict() {
    let space = std::sync::Arc::new(cube(4, 3));
    let mut model =
        ForestCostModel::new(space, FeatureKind::Structural.extractor(), 2).unwrap();
    model.close().unwrap();

    assert!(matches!(
        model.fit(&HistorySnapshot::default()),
        Err(Error::PoolClosed)
    ));
    assert!(matches!(model.predict(&[0, 1]), Err(Error::PoolClosed)));
}
