use core::ops::ControlFlow;
use std::sync::Arc;

use super::{TuneSummary, Tuner};
use crate::acquisition::Acquisition;
use crate::error::{Error, Result};
use crate::history::{MeasurementRecord, Outcome};
use crate::measure::{Measurer, Progress};
use crate::model::NEUTRAL_MEAN;
use crate::optimizer::SearchContext;
use crate::types::{FailureKind, StopReason, TunerState};

/// Random draws before falling back to a scan for an unvisited index.
const RANDOM_ATTEMPTS: usize = 64;

/// Per-call counters.
#[derive(Default)]
struct Counters {
    trials: usize,
    successes: usize,
    failures: usize,
    refits: usize,
    since_improvement: usize,
}

impl Tuner {
    /// Measure up to `n_trials` configurations with `measurer`.
    ///
    /// The loop plans with the current model (untrained on a fresh tuner),
    /// dispatches batches of the plan, records every result, and refits
    /// and replans once `plan_size` trials have been recorded since the
    /// last refit. It ends when the budget is used up, every configuration
    /// has been measured, `early_stopping` trials pass without a new best,
    /// or a measurer hook breaks. Failed measurements are recorded, count
    /// against the budget and never stop the loop.
    ///
    /// The worker pool is released before returning, on success and on
    /// error alike.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the tuner was already closed (for
    /// example by an earlier `tune`),
    /// [`Error::MeasurementCountMismatch`] if the measurer breaks its
    /// contract, and any error from the cost model or from releasing the
    /// pool.
    pub fn tune<M>(&mut self, n_trials: usize, measurer: &mut M) -> Result<TuneSummary>
    where
        M: Measurer + ?Sized,
    {
        if self.closed {
            return Err(Error::PoolClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("tune", n_trials, plan_size = self.config.plan_size)
            .entered();

        let outcome = self.run(n_trials, measurer);
        let released = self.close();
        self.state = TunerState::Done;

        let summary = outcome?;
        released?;

        trace_info!(
            trials = summary.trials,
            successes = summary.successes,
            failures = summary.failures,
            best = ?summary.best.as_ref().and_then(|b| b.score()),
            stop_reason = ?summary.stop_reason,
            "tuning finished"
        );
        Ok(summary)
    }

    fn run<M>(&mut self, n_trials: usize, measurer: &mut M) -> Result<TuneSummary>
    where
        M: Measurer + ?Sized,
    {
        let mut counters = Counters::default();

        self.state = TunerState::Planning;
        if !self.storage.is_empty() {
            self.refit()?;
            counters.refits += 1;
        }
        self.replan()?;

        let stop_reason = loop {
            if counters.trials >= n_trials {
                break StopReason::BudgetExhausted;
            }
            if self.visited.len() >= self.space.len() {
                break StopReason::SpaceExhausted;
            }
            if let ControlFlow::Break(()) = measurer.before_batch(&self.progress(&counters, n_trials)) {
                break StopReason::Cancelled;
            }

            let wanted = self.config.effective_batch_size().min(n_trials - counters.trials);
            let batch = self.next_batch(wanted);
            if batch.is_empty() {
                break StopReason::SpaceExhausted;
            }
            // Resolved before measuring so a model error cannot drop results.
            let features = self.model.features(&batch)?;

            self.state = TunerState::AwaitingMeasurement;
            let results = measurer.measure(&batch);
            if results.len() != batch.len() {
                return Err(Error::MeasurementCountMismatch {
                    expected: batch.len(),
                    got: results.len(),
                });
            }

            self.state = TunerState::Updating;
            let mut records = Vec::with_capacity(batch.len());
            for ((index, result), features) in batch.into_iter().zip(results).zip(features) {
                let record = Arc::new(MeasurementRecord::new(
                    self.storage.next_record_id(),
                    index,
                    features,
                    finite_or_failure(result.outcome),
                    result.cost,
                ));
                self.storage.push(MeasurementRecord::clone(&record));
                self.record_trial(&record, &mut counters);
                records.push(record);
            }

            if let ControlFlow::Break(()) =
                measurer.after_batch(&self.progress(&counters, n_trials), &records)
            {
                break StopReason::Cancelled;
            }
            if self
                .config
                .early_stopping
                .is_some_and(|patience| counters.since_improvement >= patience)
            {
                break StopReason::EarlyStopped;
            }

            if self.trials_since_refit >= self.config.plan_size {
                self.state = TunerState::Planning;
                self.refit()?;
                counters.refits += 1;
                self.replan()?;
            }
        };

        Ok(TuneSummary {
            trials: counters.trials,
            successes: counters.successes,
            failures: counters.failures,
            refits: counters.refits,
            best: self.best.clone(),
            stop_reason,
        })
    }

    fn record_trial(&mut self, record: &Arc<MeasurementRecord>, counters: &mut Counters) {
        counters.trials += 1;
        self.trials_since_refit += 1;

        if record.outcome.is_success() {
            counters.successes += 1;
            self.n_successes += 1;
            if self.offer_best(record) {
                counters.since_improvement = 0;
                trace_debug!(id = record.id, index = record.index, score = ?record.score(), "new best");
            } else {
                counters.since_improvement += 1;
            }
        } else {
            counters.failures += 1;
            counters.since_improvement += 1;
            trace_debug!(id = record.id, index = record.index, outcome = ?record.outcome, "measurement failed");
        }

        let interval = self.config.log_interval;
        if interval > 0 && counters.trials % interval == 0 {
            trace_info!(
                trials = counters.trials,
                successes = counters.successes,
                failures = counters.failures,
                best = ?self.best.as_ref().and_then(|b| b.score()),
                "tuning progress"
            );
        }
    }

    fn progress(&self, counters: &Counters, budget: usize) -> Progress {
        Progress {
            trials: counters.trials,
            budget,
            successes: self.n_successes,
            best_score: self.best.as_ref().and_then(|b| b.score()),
        }
    }

    fn refit(&mut self) -> Result<()> {
        let snapshot = self.storage.snapshot();
        let _outcome = self.model.fit(&snapshot)?;
        self.n_refits += 1;
        self.trials_since_refit = 0;
        trace_debug!(version = snapshot.version(), outcome = ?_outcome, "cost model refit");
        Ok(())
    }

    /// The acquisition function for the next plan.
    fn acquisition(&self) -> Result<Acquisition> {
        if !self.config.uncertainty_aware {
            return Ok(Acquisition::mean());
        }
        let incumbent = match &self.best {
            Some(best) if self.model.is_trained() => self
                .model
                .predict(&[best.index])?
                .first()
                .map_or(NEUTRAL_MEAN, |p| p.mean),
            _ => NEUTRAL_MEAN,
        };
        Ok(Acquisition::expected_improvement(
            incumbent,
            self.schedule.weight(self.n_successes),
        ))
    }

    fn replan(&mut self) -> Result<()> {
        let plan_size = self.config.plan_size;
        let acquisition = self.acquisition()?;
        let ctx = SearchContext {
            space: &*self.space,
            acquisition,
            exclude: &self.visited,
        };

        let plan = match &self.diversity {
            Some(filter) => {
                let shortlist = self.optimizer.find_candidates(
                    &*self.model,
                    &ctx,
                    filter.shortlist_size(plan_size),
                )?;
                let scores = acquisition.score_all(&self.model.predict(&shortlist)?);
                let features = self.model.features(&shortlist)?;
                filter.select(&shortlist, &scores, &features, plan_size)
            }
            None => {
                let mut candidates = self.optimizer.find_candidates(&*self.model, &ctx, plan_size)?;
                candidates.truncate(plan_size);
                candidates
            }
        };

        trace_debug!(
            optimizer = self.optimizer.name(),
            planned = plan.len(),
            weight = acquisition.weight(),
            "new plan"
        );
        self.plan = plan;
        self.cursor = 0;
        Ok(())
    }

    /// Take up to `wanted` unvisited indices, marking them visited.
    ///
    /// Entries come from the plan until the cursor reaches the trailing
    /// `epsilon_greedy` fraction of it; from there on they are random.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn next_batch(&mut self, wanted: usize) -> Vec<usize> {
        let tail = (self.config.epsilon_greedy * self.plan.len() as f64) as usize;
        let greedy_end = self.plan.len().saturating_sub(tail);

        let mut batch = Vec::with_capacity(wanted);
        while batch.len() < wanted && self.visited.len() < self.space.len() {
            while self.cursor < self.plan.len() && self.visited.contains(&self.plan[self.cursor]) {
                self.cursor += 1;
            }
            let next = if self.cursor < greedy_end {
                let index = self.plan[self.cursor];
                self.cursor += 1;
                Some(index)
            } else {
                self.random_unvisited()
            };
            let Some(index) = next else { break };
            self.visited.insert(index);
            batch.push(index);
        }
        batch
    }

    fn random_unvisited(&mut self) -> Option<usize> {
        let len = self.space.len();
        for _ in 0..RANDOM_ATTEMPTS {
            let index = self.space.sample(&mut self.rng);
            if !self.visited.contains(&index) {
                return Some(index);
            }
        }
        let start = self.rng.usize(0..len);
        (start..len)
            .chain(0..start)
            .find(|i| !self.visited.contains(i))
    }
}

/// A success without a finite score is stored as a runtime failure.
fn finite_or_failure(outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Success { score } if !score.is_finite() => Outcome::Failure {
            kind: FailureKind::RuntimeError,
            message: format!("non-finite score {score}"),
        },
        other => other,
    }
}
