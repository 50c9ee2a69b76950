//! Journal storage: persist measurements to disk and resume later.
//!
//! `JournalStorage` appends every measurement record to a JSONL file. A new
//! tuner opened on the same file skips everything already measured and
//! warm-starts its cost model from the stored results.
//!
//! Run with: `cargo run --example journal_resume --features journal`

use core::time::Duration;

use autotuner::prelude::*;

/// Scores a configuration by its squared distance from `[5, 2, 7]`.
struct Distance<'a>(&'a KnobSpace);

impl Measurer for Distance<'_> {
    fn measure(&mut self, batch: &[usize]) -> Vec<MeasureResult> {
        const TARGET: [i64; 3] = [5, 2, 7];
        batch
            .iter()
            .map(|&i| {
                let p = self.0.point(i);
                let d: i64 = p.iter().zip(TARGET).map(|(&a, b)| (a - b) * (a - b)).sum();
                MeasureResult::success(100.0 - d as f64, Duration::from_millis(1))
            })
            .collect()
    }
}

fn main() -> autotuner::Result<()> {
    let path = std::env::temp_dir().join("autotuner_journal_example.jsonl");

    // Clean up from any previous run
    let _ = std::fs::remove_file(&path);

    let space = KnobSpace::new(vec![
        Knob::range("a", 0, 9),
        Knob::range("b", 0, 9),
        Knob::range("c", 0, 9),
    ])?;

    // --- First run: 32 measurements persisted to disk ---
    {
        let mut tuner = Tuner::builder(space.clone())
            .storage(JournalStorage::new(&path))
            .plan_size(16)
            .seed(1)
            .build()?;
        tuner.tune(32, &mut Distance(&space))?;

        println!(
            "First run: {} records saved to {}",
            tuner.n_trials(),
            path.display()
        );
    }

    // --- Second run: resume from the journal file ---
    {
        let mut tuner = Tuner::builder(space.clone())
            .storage(JournalStorage::open(&path)?)
            .plan_size(16)
            .seed(2)
            .build()?;

        let before = tuner.n_trials();
        let summary = tuner.tune(32, &mut Distance(&space))?;

        if let Some(best) = summary.best {
            println!(
                "Resumed: {} -> {} records, best {:?} = {:.1}",
                before,
                tuner.n_trials(),
                space.point(best.index),
                best.score().unwrap_or(f64::NAN)
            );
        }
    }

    // Clean up
    let _ = std::fs::remove_file(&path);

    Ok(())
}
