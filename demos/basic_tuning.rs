//! Basic tuning example: search a small tiling space for the fastest kernel.
//!
//! The "kernel" is a synthetic cost function over three knobs. Oversized
//! tiles are reported as invalid configurations, the way a real measurer
//! would report a launch failure. No feature flags are required.
//!
//! Run with: `cargo run --example basic_tuning`

use core::time::Duration;

use autotuner::prelude::*;

/// Pretend GFLOP/s of a tiled kernel; peaks at tile 32x8, unroll 4.
fn gflops(tile_x: i64, tile_y: i64, unroll: i64) -> f64 {
    let tx = (tile_x as f64).log2() - 5.0;
    let ty = (tile_y as f64).log2() - 3.0;
    let u = (unroll as f64 - 4.0) / 4.0;
    100.0 * (-(tx * tx + ty * ty + u * u) / 4.0).exp()
}

fn main() -> autotuner::Result<()> {
    let space = KnobSpace::new(vec![
        Knob::new("tile_x", vec![1, 2, 4, 8, 16, 32, 64, 128]),
        Knob::new("tile_y", vec![1, 2, 4, 8, 16, 32, 64, 128]),
        Knob::new("unroll", vec![0, 1, 2, 4, 8]),
    ])?;
    println!("Search space: {} configurations", space.len());

    let mut tuner = Tuner::builder(space.clone())
        .plan_size(16)
        .seed(42)
        .build()?;

    // Measure 64 of the 320 configurations.
    let summary = tuner.tune(64, &mut |batch: &[usize]| {
        batch
            .iter()
            .map(|&i| {
                let p = space.point(i);
                if p[0] * p[1] > 1024 {
                    return MeasureResult::failure(
                        FailureKind::InvalidConfig,
                        "shared memory exceeded",
                        Duration::ZERO,
                    );
                }
                MeasureResult::success(gflops(p[0], p[1], p[2]), Duration::from_millis(2))
            })
            .collect::<Vec<_>>()
    })?;

    println!(
        "Measured {} ({} ok, {} failed), {} refits, stopped: {:?}",
        summary.trials, summary.successes, summary.failures, summary.refits, summary.stop_reason
    );
    if let Some(best) = summary.best {
        let p = space.point(best.index);
        println!(
            "Best: tile_x={} tile_y={} unroll={} -> {:.2} GFLOP/s",
            p[0],
            p[1],
            p[2],
            best.score().unwrap_or(f64::NAN)
        );
    }

    Ok(())
}
