use autotuner::prelude::*;

use crate::test_spaces::cube;

#[test]
fn invalid_options_fail_at_build() {
    let err = |b: TunerBuilder| b.build().unwrap_err();

    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).plan_size(0)),
        Error::InvalidPlanSize
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).batch_size(0)),
        Error::InvalidBatchSize
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).num_threads(0)),
        Error::InvalidThreadCount
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).diversity_filter_ratio(0.5)),
        Error::InvalidDiversityRatio(_)
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).epsilon_greedy(-0.1)),
        Error::InvalidEpsilon(_)
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).uncertainty_half_life(0)),
        Error::InvalidHalfLife
    ));
    assert!(matches!(
        err(Tuner::builder(cube(4, 2)).optimizer_name("xgb")),
        Error::UnknownOptimizer(name) if name == "xgb"
    ));
}

#[test]
fn config_round_trips_through_builder() {
    let config = TunerConfig {
        plan_size: 12,
        batch_size: Some(4),
        feature_type: FeatureKind::SampledRelation,
        num_threads: Some(2),
        diversity_filter_ratio: Some(1.5),
        log_interval: 0,
        epsilon_greedy: 0.1,
        seed: Some(9),
        ..TunerConfig::default()
    };
    let tuner = Tuner::builder(cube(4, 3))
        .config(config.clone())
        .build()
        .unwrap();

    assert_eq!(tuner.config(), &config);
    assert_eq!(tuner.state(), TunerState::Idle);
    assert_eq!(tuner.n_trials(), 0);
    assert!(tuner.best().is_none());
    assert!(tuner.plan().is_empty());
}

#[test]
fn custom_optimizer_replaces_named_one() {
    let tuner = Tuner::builder(cube(4, 2))
        .optimizer_name("unused")
        .optimizer(SimulatedAnnealingOptimizer::with_seed(1))
        .num_threads(1)
        .build();
    assert!(tuner.is_ok());
}
