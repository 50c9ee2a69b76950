use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use autotuner::model::{DegenerateReason, FitOutcome};
use autotuner::prelude::*;

use crate::test_spaces::{always_failing, cube};

#[test]
fn all_failures_terminate_without_best() {
    let space = cube(5, 3);
    let mut tuner = Tuner::builder(space)
        .plan_size(8)
        .num_threads(1)
        .seed(0)
        .build()
        .unwrap();

    let summary = tuner.tune(40, &mut always_failing).unwrap();

    assert_eq!(summary.trials, 40);
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.failures, 40);
    assert!(summary.best.is_none());
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
    assert!(tuner.best().is_none());
    assert_eq!(tuner.history().len(), 40);
    assert!(
        tuner
            .history()
            .records()
            .iter()
            .all(|r| matches!(r.outcome, Outcome::Failure { kind: FailureKind::CompileError, .. }))
    );
}

#[test]
fn failures_never_become_best() {
    let space = cube(6, 2);
    let mut tuner = Tuner::builder(space.clone())
        .plan_size(6)
        .num_threads(1)
        .seed(5)
        .build()
        .unwrap();

    // The highest-scoring corner always times out.
    let summary = tuner
        .tune(36, &mut |batch: &[usize]| {
            batch
                .iter()
                .map(|&i| {
                    let p = space.point(i);
                    if p[0] >= 4 {
                        MeasureResult::failure(FailureKind::Timeout, "too slow", Duration::ZERO)
                    } else {
                        MeasureResult::success((p[0] + p[1]) as f64, Duration::ZERO)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap();

    assert_eq!(summary.trials, 36);
    assert_eq!(summary.failures, 12);
    assert_eq!(summary.successes, 24);
    let best = summary.best.unwrap();
    assert_eq!(space.point(best.index), vec![3, 5]);
    assert!((best.score().unwrap() - 8.0).abs() < 1e-12);
}

#[test]
fn non_finite_scores_count_as_failures() {
    let space = cube(4, 2);
    let mut tuner = Tuner::builder(space)
        .plan_size(4)
        .num_threads(1)
        .seed(2)
        .build()
        .unwrap();

    let summary = tuner
        .tune(8, &mut |batch: &[usize]| {
            batch
                .iter()
                .map(|_| MeasureResult::success(f64::NAN, Duration::ZERO))
                .collect::<Vec<_>>()
        })
        .unwrap();

    assert_eq!(summary.successes, 0);
    assert_eq!(summary.failures, 8);
    assert!(summary.best.is_none());
    assert!(tuner.history().records().iter().all(|r| matches!(
        r.outcome,
        Outcome::Failure {
            kind: FailureKind::RuntimeError,
            ..
        }
    )));
}

#[test]
fn wrong_result_count_is_a_contract_violation() {
    let space = cube(4, 2);
    let mut tuner = Tuner::builder(space)
        .plan_size(4)
        .num_threads(1)
        .build()
        .unwrap();

    let err = tuner
        .tune(8, &mut |_: &[usize]| Vec::<MeasureResult>::new())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MeasurementCountMismatch {
            expected: 4,
            got: 0
        }
    ));
    assert!(tuner.is_closed());
    assert_eq!(tuner.state(), TunerState::Done);
}

/// An untrained model whose feature lookup breaks on the second batch.
struct BreaksOnSecondBatch {
    calls: AtomicUsize,
}

impl CostModel for BreaksOnSecondBatch {
    fn fit(&mut self, _: &HistorySnapshot) -> Result<FitOutcome> {
        Ok(FitOutcome::Degenerate(DegenerateReason::NoSuccesses))
    }

    fn predict(&self, indices: &[usize]) -> Result<Vec<Prediction>> {
        Ok(vec![Prediction::unknown(); indices.len()])
    }

    fn features(&self, indices: &[usize]) -> Result<Vec<Arc<[f64]>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= 1 {
            return Err(Error::PoolClosed);
        }
        Ok(indices.iter().map(|&i| Arc::from(vec![i as f64])).collect())
    }

    fn is_trained(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn model_errors_never_lose_measured_results() {
    let space = cube(6, 2);
    let mut tuner = Tuner::builder(space)
        .plan_size(4)
        .cost_model(BreaksOnSecondBatch {
            calls: AtomicUsize::new(0),
        })
        .seed(8)
        .build()
        .unwrap();

    let mut measured = Vec::new();
    let err = tuner
        .tune(16, &mut |batch: &[usize]| {
            measured.extend_from_slice(batch);
            batch
                .iter()
                .map(|_| MeasureResult::success(1.0, Duration::ZERO))
                .collect::<Vec<_>>()
        })
        .unwrap_err();

    assert!(matches!(err, Error::PoolClosed));
    assert_eq!(measured.len(), 4);
    let stored: Vec<usize> = tuner.history().records().iter().map(|r| r.index).collect();
    assert_eq!(stored, measured);
}
