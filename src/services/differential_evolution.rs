//! Differential evolution over the feasible volume box.
//!
//! Classic best-1-bin: each member's trial vector adds a scaled
//! difference of two random members to the incumbent best, crosses over
//! per-dimension with a guaranteed slot, and replaces its target when no
//! worse. Mutation scale and crossover probability anneal as population
//! fitness diversity collapses, trading exploration for exploitation
//! late in the run. Trial evaluation is parallelized; the loop checks
//! the wall-clock deadline every generation.

use std::time::Duration;

use ndarray::Array1;
use rand::prelude::*;
use rayon::prelude::*;

use crate::services::optimizer::{
    Deadline, OptimizerReport, ProgressCallback, ProgressUpdate, StopReason,
};

#[derive(Debug, Clone)]
pub struct DeConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    /// Differential weight F.
    pub mutation: f64,
    /// Crossover probability CR.
    pub recombination: f64,
    /// Stop when the best fitness improves less than this across the
    /// trailing window.
    pub convergence_threshold: f64,
    pub convergence_window: usize,
    /// Generations between progress callbacks.
    pub progress_interval: usize,
    pub seed: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            max_iterations: 300,
            mutation: 0.8,
            recombination: 0.9,
            convergence_threshold: 1e-4,
            convergence_window: 25,
            progress_interval: 10,
            seed: None,
            time_limit: None,
        }
    }
}

pub struct DifferentialEvolution<'a, F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    objective: &'a F,
    lower: Array1<f64>,
    upper: Array1<f64>,
    config: DeConfig,
}

impl<'a, F> DifferentialEvolution<'a, F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    pub fn new(objective: &'a F, lower: Array1<f64>, upper: Array1<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds length mismatch");
        Self {
            objective,
            lower,
            upper,
            config: DeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn solve(&self, progress: ProgressCallback) -> OptimizerReport {
        let n = self.lower.len();
        let npop = self.config.population_size.max(4);
        let deadline = Deadline::new(self.config.time_limit);
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Uniform random initialization within the bounds.
        let mut population: Vec<Array1<f64>> = (0..npop)
            .map(|_| {
                Array1::from_shape_fn(n, |d| rng.gen_range(self.lower[d]..=self.upper[d]))
            })
            .collect();
        let mut energies: Vec<f64> =
            population.par_iter().map(|x| (self.objective)(x)).collect();
        let mut evaluations = npop;

        // Strict minimum, first seen wins on ties.
        let (best_idx, mut best_f) = argmin(&energies);
        let mut best_x = population[best_idx].clone();
        let initial_best = best_f;

        let mut history = vec![best_f];
        let mut stop_reason = StopReason::MaxIterations;
        let mut iterations = 0;

        for generation in 1..=self.config.max_iterations {
            if deadline.expired() {
                stop_reason = StopReason::DeadlineExceeded;
                break;
            }
            iterations = generation;

            // Anneal F and CR on fitness diversity collapse.
            let (mean, std) = mean_std(&energies);
            let diversity = if mean.abs() > 1e-12 { std / mean.abs() } else { std };
            let anneal = (diversity / 0.05).clamp(0.5, 1.0);
            let f_gen = self.config.mutation * anneal;
            let cr_gen = (self.config.recombination * anneal).max(0.5);

            let trials: Vec<Array1<f64>> = (0..npop)
                .map(|i| {
                    let (r1, r2) = distinct_pair(i, npop, &mut rng);
                    let forced = rng.gen_range(0..n);
                    Array1::from_shape_fn(n, |d| {
                        let v = if d == forced || rng.gen::<f64>() < cr_gen {
                            best_x[d] + f_gen * (population[r1][d] - population[r2][d])
                        } else {
                            population[i][d]
                        };
                        v.clamp(self.lower[d], self.upper[d])
                    })
                })
                .collect();

            let trial_energies: Vec<f64> =
                trials.par_iter().map(|x| (self.objective)(x)).collect();
            evaluations += npop;

            for (i, (trial, &ft)) in trials.into_iter().zip(&trial_energies).enumerate() {
                if ft <= energies[i] {
                    population[i] = trial;
                    energies[i] = ft;
                    if ft < best_f {
                        best_f = ft;
                        best_x = population[i].clone();
                    }
                }
            }

            history.push(best_f);
            if history.len() > self.config.convergence_window {
                let window_start = history[history.len() - 1 - self.config.convergence_window];
                if window_start - best_f < self.config.convergence_threshold {
                    stop_reason = StopReason::Converged;
                    break;
                }
            }

            if generation % self.config.progress_interval.max(1) == 0 {
                let update = ProgressUpdate {
                    iteration: generation,
                    best_fitness: best_f,
                    elapsed: deadline.elapsed(),
                };
                if !progress(&update) {
                    stop_reason = StopReason::CallbackRequested;
                    break;
                }
            }
        }

        OptimizerReport {
            best_solution: best_x,
            best_fitness: best_f,
            initial_best_fitness: initial_best,
            iterations,
            evaluations,
            stop_reason,
        }
    }
}

fn argmin(values: &[f64]) -> (usize, f64) {
    let mut idx = 0;
    let mut best = values[0];
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < best {
            best = v;
            idx = i;
        }
    }
    (idx, best)
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Two distinct member indices, both different from `exclude`.
fn distinct_pair<R: Rng>(exclude: usize, pool: usize, rng: &mut R) -> (usize, usize) {
    debug_assert!(pool >= 3);
    let mut r1 = rng.gen_range(0..pool);
    while r1 == exclude {
        r1 = rng.gen_range(0..pool);
    }
    let mut r2 = rng.gen_range(0..pool);
    while r2 == exclude || r2 == r1 {
        r2 = rng.gen_range(0..pool);
    }
    (r1, r2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &Array1<f64>) -> f64 {
        x.iter().map(|v| (v - 0.3) * (v - 0.3)).sum()
    }

    fn bounds(n: usize) -> (Array1<f64>, Array1<f64>) {
        (Array1::zeros(n), Array1::ones(n))
    }

    #[test]
    fn minimizes_a_smooth_bowl() {
        let (lower, upper) = bounds(3);
        let de = DifferentialEvolution::new(&sphere, lower, upper).with_config(DeConfig {
            seed: Some(7),
            ..DeConfig::default()
        });
        let report = de.solve(&mut |_| true);
        assert!(report.best_fitness < 1e-3, "fitness {}", report.best_fitness);
        for &v in report.best_solution.iter() {
            assert!((v - 0.3).abs() < 0.05);
        }
    }

    #[test]
    fn best_never_regresses_from_initialization() {
        let (lower, upper) = bounds(4);
        let de = DifferentialEvolution::new(&sphere, lower, upper).with_config(DeConfig {
            seed: Some(11),
            max_iterations: 50,
            ..DeConfig::default()
        });
        let report = de.solve(&mut |_| true);
        assert!(report.best_fitness <= report.initial_best_fitness);
    }

    #[test]
    fn zero_deadline_returns_initial_best() {
        let (lower, upper) = bounds(3);
        let de = DifferentialEvolution::new(&sphere, lower, upper).with_config(DeConfig {
            seed: Some(3),
            time_limit: Some(Duration::ZERO),
            ..DeConfig::default()
        });
        let report = de.solve(&mut |_| true);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.stop_reason, StopReason::DeadlineExceeded);
        assert!(report.best_fitness.is_finite());
    }

    #[test]
    fn callback_stops_the_run_cooperatively() {
        let (lower, upper) = bounds(3);
        let de = DifferentialEvolution::new(&sphere, lower, upper).with_config(DeConfig {
            seed: Some(5),
            ..DeConfig::default()
        });
        let mut calls = 0;
        let report = de.solve(&mut |_| {
            calls += 1;
            false
        });
        assert_eq!(calls, 1);
        assert_eq!(report.stop_reason, StopReason::CallbackRequested);
        assert!(report.iterations <= 10);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (lower, upper) = bounds(3);
        let config = DeConfig {
            seed: Some(42),
            max_iterations: 60,
            ..DeConfig::default()
        };
        let a = DifferentialEvolution::new(&sphere, lower.clone(), upper.clone())
            .with_config(config.clone())
            .solve(&mut |_| true);
        let b = DifferentialEvolution::new(&sphere, lower, upper)
            .with_config(config)
            .solve(&mut |_| true);
        assert_eq!(a.best_fitness, b.best_fitness);
        assert_eq!(a.best_solution, b.best_solution);
    }

    #[test]
    fn solutions_respect_bounds() {
        let lower = Array1::from_vec(vec![0.5, 1.0]);
        let upper = Array1::from_vec(vec![2.0, 3.0]);
        let objective = |x: &Array1<f64>| x.sum();
        let de = DifferentialEvolution::new(&objective, lower.clone(), upper.clone())
            .with_config(DeConfig {
                seed: Some(1),
                max_iterations: 40,
                ..DeConfig::default()
            });
        let report = de.solve(&mut |_| true);
        for d in 0..2 {
            assert!(report.best_solution[d] >= lower[d] - 1e-12);
            assert!(report.best_solution[d] <= upper[d] + 1e-12);
        }
    }
}
