//! Optimization orchestrator: the engine's single entry point.
//!
//! Validates the request, narrows an oversupplied palette down to a
//! diverse subset, picks an algorithm, runs it against the wall-clock
//! budget and assembles the final formula, metrics and alternatives.
//! Out-of-gamut targets and exhausted budgets are successful outcomes
//! with caveat flags, never errors.

use std::time::Duration;

use ndarray::Array1;
use rand::prelude::*;

use crate::models::{
    AccuracyRating, Algorithm, LabColor, MixError, MixingComplexity, MixingFormula,
    OptimizationMetrics, OptimizationRequest, OptimizationResult, Paint, PaintRatio, Result,
};
use crate::services::constraints::ConstraintSet;
use crate::services::delta_e::delta_e;
use crate::services::differential_evolution::{DeConfig, DifferentialEvolution};
use crate::services::kubelka_munk::MixingModel;
use crate::services::optimizer::{Deadline, ProgressUpdate};
use crate::services::tpe_hybrid::{TpeConfig, TpeHybrid};

/// Alternative trade-off candidates returned next to the main formula.
const ALTERNATIVE_COUNT: usize = 3;

/// Search for the paint mixture whose predicted color best matches the
/// request's target, within its volume and time constraints.
pub fn optimize(request: &OptimizationRequest) -> Result<OptimizationResult> {
    let deadline = Deadline::new(Some(Duration::from_millis(request.time_limit_ms)));
    request.validate()?;

    // Narrow an oversupplied palette by LAB-space coverage.
    let selected_idx = if request.available_paints.len() > request.max_paint_count {
        select_diverse_paints(
            &request.available_paints,
            &request.target_color,
            request.max_paint_count,
        )
    } else {
        (0..request.available_paints.len()).collect()
    };
    let paints: Vec<Paint> = selected_idx
        .iter()
        .map(|&i| request.available_paints[i].clone())
        .collect();

    let model = MixingModel::new(&paints);
    let constraints = ConstraintSet::new(&request.volume_constraints, paints.len());
    let (lower, upper) = constraints.bounds();

    let target = request.target_color;
    let objective = |x: &Array1<f64>| -> f64 {
        let volumes = x.as_slice().unwrap_or(&[]);
        match model.predict(volumes) {
            Ok(predicted) => delta_e(&target, &predicted) + constraints.penalty(volumes),
            Err(_) => f64::MAX,
        }
    };

    let algorithm = resolve_algorithm(request);
    let budget = deadline.remaining().unwrap_or(Duration::ZERO);
    let mut keep_going = |_update: &ProgressUpdate| !deadline.expired();

    let report = match algorithm {
        Algorithm::DifferentialEvolution => {
            let config = DeConfig {
                max_iterations: if request.preferences.prioritize_speed { 150 } else { 300 },
                seed: request.seed,
                time_limit: Some(budget),
                ..DeConfig::default()
            };
            DifferentialEvolution::new(&objective, lower.clone(), upper.clone())
                .with_config(config)
                .solve(&mut keep_going)
        }
        Algorithm::TpeHybrid => {
            let config = TpeConfig {
                max_trials: if request.preferences.prioritize_accuracy { 350 } else { 250 },
                seed: request.seed,
                time_limit: Some(budget),
                ..TpeConfig::default()
            };
            TpeHybrid::new(&objective, lower.clone(), upper.clone())
                .with_config(config)
                .solve(&mut keep_going)
        }
        Algorithm::Auto => unreachable!("auto resolved before dispatch"),
    };

    let best_volumes = constraints.project(&report.best_solution);
    let formula = build_formula(&paints, &best_volumes, &model, &target)?;

    let alternatives = build_alternatives(
        request,
        &paints,
        &model,
        &constraints,
        &lower,
        &upper,
        &target,
    );

    let initial = report.initial_best_fitness;
    let final_best = report.best_fitness;
    let metrics = OptimizationMetrics {
        iterations_completed: report.iterations,
        time_elapsed_ms: deadline.elapsed().as_millis() as u64,
        algorithm_used: algorithm.as_str().to_string(),
        convergence_achieved: report.converged(),
        target_met: formula.delta_e <= request.accuracy_target,
        initial_best_delta_e: initial,
        final_best_delta_e: final_best,
        improvement_rate: if initial > 0.0 {
            ((initial - final_best) / initial).max(0.0)
        } else {
            0.0
        },
        early_termination: report.stopped_early(),
    };

    Ok(OptimizationResult {
        formula,
        metrics,
        alternatives,
    })
}

/// Resolve `auto` to a concrete algorithm.
///
/// Small palettes with a speed preference suit the population search;
/// large palettes with room in the budget, or accuracy-first requests,
/// suit the sequential sampler.
fn resolve_algorithm(request: &OptimizationRequest) -> Algorithm {
    match request.algorithm {
        Algorithm::Auto => {
            let paint_count = request.available_paints.len();
            if request.preferences.prioritize_speed && paint_count <= 8 {
                Algorithm::DifferentialEvolution
            } else if (paint_count > 15 && request.time_limit_ms > 30_000)
                || request.preferences.prioritize_accuracy
            {
                Algorithm::TpeHybrid
            } else {
                Algorithm::DifferentialEvolution
            }
        }
        explicit => explicit,
    }
}

/// Greedy farthest-point subset: seed with the paint nearest the target,
/// then keep adding whichever paint is farthest from everything chosen.
/// Maximizes LAB-space coverage instead of taking the first N.
fn select_diverse_paints(paints: &[Paint], target: &LabColor, count: usize) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(count);

    let mut nearest = 0;
    let mut nearest_d = f64::MAX;
    for (i, paint) in paints.iter().enumerate() {
        let d = delta_e(&paint.lab, target);
        if d < nearest_d {
            nearest_d = d;
            nearest = i;
        }
    }
    selected.push(nearest);

    while selected.len() < count {
        let mut farthest = None;
        let mut farthest_d = -1.0;
        for (i, paint) in paints.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let spread = selected
                .iter()
                .map(|&j| delta_e(&paint.lab, &paints[j].lab))
                .fold(f64::MAX, f64::min);
            if spread > farthest_d {
                farthest_d = spread;
                farthest = Some(i);
            }
        }
        match farthest {
            Some(i) => selected.push(i),
            None => break,
        }
    }
    selected
}

/// Assemble the caller-facing recipe from a feasible volume vector.
fn build_formula(
    paints: &[Paint],
    volumes: &Array1<f64>,
    model: &MixingModel,
    target: &LabColor,
) -> Result<MixingFormula> {
    let slice = volumes.as_slice().unwrap_or(&[]);
    let total: f64 = slice.iter().sum();
    if total <= 0.0 {
        return Err(MixError::InvalidInput("empty formula".into()));
    }

    let predicted = model.predict(slice)?;
    let d = delta_e(target, &predicted);

    let mut paint_ratios = Vec::with_capacity(paints.len());
    let mut opacity = 0.0;
    let mut km_k = 0.0;
    let mut km_s = 0.0;
    for (paint, &volume) in paints.iter().zip(slice) {
        let fraction = volume / total;
        paint_ratios.push(PaintRatio {
            paint_id: paint.id.clone(),
            volume_ml: volume,
            percentage: fraction * 100.0,
        });
        opacity += fraction * paint.opacity;
        km_k += fraction * paint.optical.k;
        km_s += fraction * paint.optical.s;
    }

    Ok(MixingFormula {
        mixing_complexity: MixingComplexity::from_paint_count(paint_ratios.len()),
        paint_ratios,
        total_volume_ml: total,
        delta_e: d,
        accuracy_rating: AccuracyRating::from_delta_e(d),
        opacity,
        kubelka_munk_k: km_k,
        kubelka_munk_s: km_s,
    })
}

/// Random feasible candidates ranked by an accuracy/cost trade-off.
fn build_alternatives(
    request: &OptimizationRequest,
    paints: &[Paint],
    model: &MixingModel,
    constraints: &ConstraintSet,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    target: &LabColor,
) -> Vec<MixingFormula> {
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let cost_weight = if request.preferences.prioritize_cost { 0.5 } else { 0.05 };

    let mut scored: Vec<(f64, MixingFormula)> = Vec::with_capacity(ALTERNATIVE_COUNT);
    for _ in 0..ALTERNATIVE_COUNT {
        let raw = Array1::from_shape_fn(lower.len(), |d| rng.gen_range(lower[d]..=upper[d]));
        let candidate = constraints.project(&raw);
        if let Ok(formula) = build_formula(paints, &candidate, model, target) {
            let cost = ConstraintSet::cost_penalty(
                candidate.as_slice().unwrap_or(&[]),
                paints,
            );
            scored.push((formula.delta_e + cost_weight * cost, formula));
        }
    }
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, f)| f).collect()
}
