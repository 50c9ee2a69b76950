use core::ops::ControlFlow;
use core::time::Duration;
use std::sync::Arc;

use autotuner::prelude::*;

use crate::test_spaces::cube;

struct Scripted {
    stop_before: bool,
    stop_after_batches: Option<usize>,
    batches: usize,
    seen: Vec<Progress>,
}

impl Scripted {
    fn new() -> Self {
        Self {
            stop_before: false,
            stop_after_batches: None,
            batches: 0,
            seen: Vec::new(),
        }
    }
}

impl Measurer for Scripted {
    fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
        batch
            .iter()
            .map(|&i| MeasureResult::success(i as f64, Duration::ZERO))
            .collect()
    }

    fn before_batch(&mut self, _progress: &Progress) -> ControlFlow<()> {
        if self.stop_before {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn after_batch(
        &mut self,
        progress: &Progress,
        records: &[Arc<MeasurementRecord>],
    ) -> ControlFlow<()> {
        assert!(!records.is_empty());
        self.batches += 1;
        self.seen.push(*progress);
        match self.stop_after_batches {
            Some(n) if self.batches >= n => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

fn tuner() -> Tuner {
    Tuner::builder(cube(6, 3))
        .plan_size(8)
        .num_threads(1)
        .seed(12)
        .build()
        .unwrap()
}

#[test]
fn before_batch_can_cancel_immediately() {
    let mut m = Scripted::new();
    m.stop_before = true;
    let summary = tuner().tune(50, &mut m).unwrap();
    assert_eq!(summary.trials, 0);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(m.batches, 0);
}

#[test]
fn after_batch_can_cancel() {
    let mut m = Scripted::new();
    m.stop_after_batches = Some(2);
    let mut t = tuner();
    let summary = t.tune(50, &mut m).unwrap();
    assert_eq!(summary.trials, 16);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(t.history().len(), 16);
    assert!(t.is_closed());
}

#[test]
fn progress_reports_running_totals() {
    let mut m = Scripted::new();
    tuner().tune(24, &mut m).unwrap();

    let trials: Vec<usize> = m.seen.iter().map(|p| p.trials).collect();
    assert_eq!(trials, vec![8, 16, 24]);
    assert!(m.seen.iter().all(|p| p.budget == 24));
    assert_eq!(m.seen[2].successes, 24);
    let bests: Vec<f64> = m.seen.iter().filter_map(|p| p.best_score).collect();
    assert_eq!(bests.len(), 3);
    assert!(bests.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn early_stopping_without_improvement() {
    let mut tuner = Tuner::builder(cube(6, 3))
        .plan_size(4)
        .early_stopping(10)
        .num_threads(1)
        .seed(1)
        .build()
        .unwrap();

    let summary = tuner
        .tune(100, &mut |batch: &[usize]| {
            batch
                .iter()
                .map(|_| MeasureResult::success(1.0, Duration::ZERO))
                .collect::<Vec<_>>()
        })
        .unwrap();

    // The first success is the best; ties never count as improvement.
    assert_eq!(summary.stop_reason, StopReason::EarlyStopped);
    assert_eq!(summary.trials, 12);
}
