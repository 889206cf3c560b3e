//! Tree-structured Parzen estimator hybrid optimizer.
//!
//! Sequential model-based search for the larger volume spaces where a
//! population spreads itself too thin: after a uniform random startup
//! phase, observed points are split at the gamma quantile into a "good"
//! and a "bad" set, each modeled per-dimension as a Parzen mixture of
//! Gaussians. Candidates drawn from the good density are ranked by the
//! good/bad log-density ratio (an expected-improvement surrogate) and
//! the winner is evaluated and appended to history. Once the sequential
//! budget is spent, a small-step coordinate descent exploits the final
//! basin - skipped outright when the deadline has already passed, so the
//! hybrid phase can never blow the time budget.

use std::time::Duration;

use ndarray::Array1;
use rand::prelude::*;
use rayon::prelude::*;

use crate::services::optimizer::{
    Deadline, OptimizerReport, ProgressCallback, ProgressUpdate, StopReason,
};

#[derive(Debug, Clone)]
pub struct TpeConfig {
    /// Uniform random trials before the density model switches on.
    pub n_startup_trials: usize,
    /// Total sequential trials, startup included.
    pub max_trials: usize,
    /// Quantile splitting good from bad observations.
    pub gamma: f64,
    /// Candidates drawn from the good density per trial.
    pub n_ei_candidates: usize,
    /// Coordinate-descent rounds in the refinement phase.
    pub refinement_rounds: usize,
    /// Trials between progress callbacks.
    pub progress_interval: usize,
    pub seed: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            n_startup_trials: 20,
            max_trials: 250,
            gamma: 0.25,
            n_ei_candidates: 24,
            refinement_rounds: 30,
            progress_interval: 10,
            seed: None,
            time_limit: None,
        }
    }
}

pub struct TpeHybrid<'a, F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    objective: &'a F,
    lower: Array1<f64>,
    upper: Array1<f64>,
    config: TpeConfig,
}

impl<'a, F> TpeHybrid<'a, F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    pub fn new(objective: &'a F, lower: Array1<f64>, upper: Array1<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds length mismatch");
        Self {
            objective,
            lower,
            upper,
            config: TpeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TpeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn solve(&self, progress: ProgressCallback) -> OptimizerReport {
        let n = self.lower.len();
        let deadline = Deadline::new(self.config.time_limit);
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let n_startup = self.config.n_startup_trials.max(2);
        let max_trials = self.config.max_trials.max(n_startup);

        // Startup: uniform random sampling, evaluated as one batch.
        let startup_points: Vec<Array1<f64>> = (0..n_startup)
            .map(|_| {
                Array1::from_shape_fn(n, |d| rng.gen_range(self.lower[d]..=self.upper[d]))
            })
            .collect();
        let startup_values: Vec<f64> = startup_points
            .par_iter()
            .map(|x| (self.objective)(x))
            .collect();
        let mut evaluations = n_startup;

        let mut history: Vec<(Array1<f64>, f64)> =
            startup_points.into_iter().zip(startup_values).collect();
        let (mut best_x, mut best_f) = {
            let mut bx = &history[0].0;
            let mut bf = history[0].1;
            for (x, f) in history.iter().skip(1) {
                if *f < bf {
                    bf = *f;
                    bx = x;
                }
            }
            (bx.clone(), bf)
        };
        let initial_best = best_f;

        let mut stop_reason = StopReason::MaxIterations;

        // Sequential TPE phase.
        while history.len() < max_trials {
            if deadline.expired() {
                stop_reason = StopReason::DeadlineExceeded;
                break;
            }

            let candidate = self.propose(&history, &mut rng);
            let value = (self.objective)(&candidate);
            evaluations += 1;
            if value < best_f {
                best_f = value;
                best_x = candidate.clone();
            }
            history.push((candidate, value));

            if history.len() % self.config.progress_interval.max(1) == 0 {
                let update = ProgressUpdate {
                    iteration: history.len(),
                    best_fitness: best_f,
                    elapsed: deadline.elapsed(),
                };
                if !progress(&update) {
                    stop_reason = StopReason::CallbackRequested;
                    break;
                }
            }
        }

        // Local refinement around the incumbent; skipped entirely when
        // the budget is gone.
        if stop_reason != StopReason::CallbackRequested && !deadline.expired() {
            let refined = self.refine(&mut best_x, &mut best_f, &deadline, &mut evaluations);
            if refined && stop_reason == StopReason::MaxIterations {
                stop_reason = StopReason::Converged;
            }
        }

        OptimizerReport {
            best_solution: best_x,
            best_fitness: best_f,
            initial_best_fitness: initial_best,
            iterations: history.len(),
            evaluations,
            stop_reason,
        }
    }

    /// Draw EI candidates from the good density, keep the best ratio.
    fn propose<R: Rng>(&self, history: &[(Array1<f64>, f64)], rng: &mut R) -> Array1<f64> {
        let n = self.lower.len();
        let mut order: Vec<usize> = (0..history.len()).collect();
        order.sort_by(|&a, &b| {
            history[a]
                .1
                .partial_cmp(&history[b].1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let n_good = ((self.config.gamma * history.len() as f64).ceil() as usize)
            .clamp(1, history.len() - 1);

        let good_model: Vec<ParzenDim> = (0..n)
            .map(|d| {
                let values: Vec<f64> =
                    order[..n_good].iter().map(|&i| history[i].0[d]).collect();
                ParzenDim::fit(values, self.lower[d], self.upper[d])
            })
            .collect();
        let bad_model: Vec<ParzenDim> = (0..n)
            .map(|d| {
                let values: Vec<f64> =
                    order[n_good..].iter().map(|&i| history[i].0[d]).collect();
                ParzenDim::fit(values, self.lower[d], self.upper[d])
            })
            .collect();

        let mut best_candidate = None;
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.config.n_ei_candidates.max(1) {
            let candidate = Array1::from_shape_fn(n, |d| good_model[d].sample(rng));
            let score: f64 = (0..n)
                .map(|d| {
                    good_model[d].log_density(candidate[d])
                        - bad_model[d].log_density(candidate[d])
                })
                .sum();
            if score > best_score {
                best_score = score;
                best_candidate = Some(candidate);
            }
        }
        // n_ei_candidates >= 1, so a candidate always exists.
        best_candidate.unwrap_or_else(|| {
            Array1::from_shape_fn(n, |d| rng.gen_range(self.lower[d]..=self.upper[d]))
        })
    }

    /// Probe-and-shrink coordinate descent around the incumbent.
    /// Returns true when the step shrank to exhaustion, i.e. a local
    /// optimum was pinned down.
    fn refine(
        &self,
        best_x: &mut Array1<f64>,
        best_f: &mut f64,
        deadline: &Deadline,
        evaluations: &mut usize,
    ) -> bool {
        let n = self.lower.len();
        let mut step: Array1<f64> =
            Array1::from_shape_fn(n, |d| 0.05 * (self.upper[d] - self.lower[d]));
        let tol = 1e-6;

        for _ in 0..self.config.refinement_rounds {
            if deadline.expired() {
                return false;
            }
            let mut improved = false;
            for d in 0..n {
                for sign in [-1.0, 1.0] {
                    let mut candidate = best_x.clone();
                    candidate[d] =
                        (candidate[d] + sign * step[d]).clamp(self.lower[d], self.upper[d]);
                    let value = (self.objective)(&candidate);
                    *evaluations += 1;
                    if value < *best_f {
                        *best_f = value;
                        *best_x = candidate;
                        improved = true;
                    }
                }
            }
            if !improved {
                step *= 0.5;
                if step.iter().all(|&s| s < tol) {
                    return true;
                }
            }
        }
        false
    }
}

/// One-dimensional Parzen mixture: a Gaussian kernel per observation,
/// bandwidth taken from the neighbor gaps.
struct ParzenDim {
    means: Vec<f64>,
    sigmas: Vec<f64>,
    lower: f64,
    upper: f64,
}

impl ParzenDim {
    fn fit(mut values: Vec<f64>, lower: f64, upper: f64) -> Self {
        let range = (upper - lower).max(f64::MIN_POSITIVE);
        if values.is_empty() {
            // Degenerate split: fall back to one broad kernel over the box.
            return Self {
                means: vec![0.5 * (lower + upper)],
                sigmas: vec![range],
                lower,
                upper,
            };
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let min_sigma = range / 100.0;
        let sigmas = (0..values.len())
            .map(|i| {
                let left = if i > 0 {
                    values[i] - values[i - 1]
                } else {
                    values[i] - lower
                };
                let right = if i + 1 < values.len() {
                    values[i + 1] - values[i]
                } else {
                    upper - values[i]
                };
                left.max(right).clamp(min_sigma, range)
            })
            .collect();
        Self {
            means: values,
            sigmas,
            lower,
            upper,
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let i = rng.gen_range(0..self.means.len());
        let value = self.means[i] + self.sigmas[i] * standard_normal(rng);
        value.clamp(self.lower, self.upper)
    }

    /// Log of the mixture density at `x`.
    fn log_density(&self, x: f64) -> f64 {
        let mut acc = 0.0;
        for (mean, sigma) in self.means.iter().zip(&self.sigmas) {
            let z = (x - mean) / sigma;
            acc += (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        }
        (acc / self.means.len() as f64).max(1e-300).ln()
    }
}

/// Box-Muller draw from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
