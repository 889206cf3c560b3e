//! Plumbing shared by the global optimizers: progress reporting,
//! deadline handling and the result report both algorithms return.

use std::time::{Duration, Instant};

use ndarray::Array1;

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub iteration: usize,
    pub best_fitness: f64,
    pub elapsed: Duration,
}

/// Cooperative progress hook. Return `false` to stop the run; the best
/// solution found so far is still returned. Cancellation is cooperative,
/// never preemptive.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(&ProgressUpdate) -> bool;

/// Why an optimizer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    MaxIterations,
    DeadlineExceeded,
    CallbackRequested,
}

/// Result of one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizerReport {
    pub best_solution: Array1<f64>,
    pub best_fitness: f64,
    /// Best fitness after initialization, before any search step.
    pub initial_best_fitness: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub stop_reason: StopReason,
}

impl OptimizerReport {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    pub fn stopped_early(&self) -> bool {
        matches!(
            self.stop_reason,
            StopReason::DeadlineExceeded | StopReason::CallbackRequested
        )
    }
}

/// Wall-clock budget for one run. Checked once per generation or trial,
/// so overrun is bounded by a single iteration's cost.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.started.elapsed() >= limit,
            None => false,
        }
    }

    /// Time left, zero when expired or `None` when unlimited.
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|l| l.saturating_sub(self.started.elapsed()))
    }
}
