//! Measurer hooks: stop tuning once a performance target is reached.
//!
//! Implementing [`Measurer`] on a struct gives access to `before_batch` and
//! `after_batch`, which see the loop's progress and can break out of it.
//!
//! Run with: `cargo run --example early_stopping`

use core::ops::ControlFlow;
use core::time::Duration;
use std::sync::Arc;

use autotuner::prelude::*;

struct UntilTarget<'a> {
    space: &'a KnobSpace,
    target: f64,
}

impl Measurer for UntilTarget<'_> {
    fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
        batch
            .iter()
            .map(|&i| {
                let p = self.space.point(i);
                let score = 50.0 - ((p[0] - 20).abs() + (p[1] - 11).abs()) as f64;
                MeasureResult::success(score, Duration::from_micros(500))
            })
            .collect()
    }

    fn after_batch(&mut self, progress: &Progress, records: &[Arc<MeasurementRecord>]) -> ControlFlow<()> {
        println!(
            "  {:>3}/{} trials, batch of {}, best so far {:?}",
            progress.trials,
            progress.budget,
            records.len(),
            progress.best_score
        );
        if progress.best_score.is_some_and(|s| s >= self.target) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn main() -> autotuner::Result<()> {
    let space = KnobSpace::new(vec![Knob::range("x", 0, 31), Knob::range("y", 0, 31)])?;

    let mut tuner = Tuner::builder(space.clone())
        .plan_size(8)
        .seed(7)
        .build()?;

    let summary = tuner.tune(
        256,
        &mut UntilTarget {
            space: &space,
            target: 48.0,
        },
    )?;

    println!(
        "Stopped after {} trials ({:?})",
        summary.trials, summary.stop_reason
    );
    Ok(())
}
