//! Volume constraint validation and projection.
//!
//! Hard constraints (total volume window, non-negative entries) decide
//! feasibility; soft constraints (the minimum practical volume per
//! included paint) accumulate into a penalty score that optimizers add
//! to their objective. Projection maps any candidate vector into the
//! feasible box, preserving the mixing ratios where it can.

use ndarray::Array1;

use crate::models::{Paint, VolumeConstraints};

/// A paint included in a formula must contribute at least this much;
/// smaller amounts cannot be measured out in practice.
pub const MIN_PRACTICAL_VOLUME_ML: f64 = 0.1;

/// Outcome of validating a candidate volume vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintReport {
    pub is_valid: bool,
    pub violations: Vec<String>,
    pub penalty_score: f64,
}

/// Volume feasibility rules for one optimization call.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    min_total: f64,
    max_total: f64,
    allow_scaling: bool,
    paint_count: usize,
}

impl ConstraintSet {
    pub fn new(volume: &VolumeConstraints, paint_count: usize) -> Self {
        Self {
            min_total: volume.min_total_volume_ml,
            max_total: volume.max_total_volume_ml,
            allow_scaling: volume.allow_scaling,
            paint_count,
        }
    }

    /// Per-paint search bounds: every included paint gets at least the
    /// practical floor, no single paint exceeds the total window.
    pub fn bounds(&self) -> (Array1<f64>, Array1<f64>) {
        let lower = Array1::from_elem(self.paint_count, MIN_PRACTICAL_VOLUME_ML);
        let upper = Array1::from_elem(self.paint_count, self.max_total);
        (lower, upper)
    }

    /// Validate against hard and soft constraints.
    pub fn validate(&self, volumes: &[f64]) -> ConstraintReport {
        let mut violations = Vec::new();
        let mut penalty = 0.0;
        let mut is_valid = true;

        for (i, &v) in volumes.iter().enumerate() {
            if v < 0.0 {
                is_valid = false;
                violations.push(format!("volume {i} is negative ({v:.3} ml)"));
            } else if v > 0.0 && v < MIN_PRACTICAL_VOLUME_ML {
                // Soft: present but unmeasurable.
                penalty += (MIN_PRACTICAL_VOLUME_ML - v) / MIN_PRACTICAL_VOLUME_ML;
                violations.push(format!(
                    "volume {i} below practical minimum ({v:.3} ml)"
                ));
            }
        }

        let total: f64 = volumes.iter().filter(|v| **v > 0.0).sum();
        if total < self.min_total {
            is_valid = false;
            violations.push(format!(
                "total volume {total:.2} ml under minimum {:.2} ml",
                self.min_total
            ));
        } else if total > self.max_total {
            is_valid = false;
            violations.push(format!(
                "total volume {total:.2} ml over maximum {:.2} ml",
                self.max_total
            ));
        }

        ConstraintReport {
            is_valid,
            violations,
            penalty_score: penalty,
        }
    }

    /// Soft-constraint penalty alone, for use inside an objective.
    pub fn penalty(&self, volumes: &[f64]) -> f64 {
        volumes
            .iter()
            .filter(|&&v| v > 0.0 && v < MIN_PRACTICAL_VOLUME_ML)
            .map(|&v| (MIN_PRACTICAL_VOLUME_ML - v) / MIN_PRACTICAL_VOLUME_ML)
            .sum()
    }

    /// Clamp a candidate into the feasible region. Entries are floored
    /// at the practical minimum, then the total is rescaled into the
    /// volume window; ratios are preserved by the rescale.
    pub fn project(&self, volumes: &Array1<f64>) -> Array1<f64> {
        let mut projected = volumes.mapv(|v| v.clamp(MIN_PRACTICAL_VOLUME_ML, self.max_total));
        let total = projected.sum();

        let target_total = if self.allow_scaling {
            total.clamp(self.min_total, self.max_total)
        } else {
            // Without scaling freedom the caller wants a predictable
            // amount; aim for the middle of the window.
            0.5 * (self.min_total + self.max_total)
        };
        if total > 0.0 && (target_total - total).abs() > f64::EPSILON {
            projected *= target_total / total;
            // Rescaling down can push small entries back under the
            // floor; restore them, accepting the slight total drift.
            projected.mapv_inplace(|v| v.max(MIN_PRACTICAL_VOLUME_ML));
        }
        projected
    }

    /// Volume-weighted cost per ml; zero when no paint carries a cost.
    pub fn cost_penalty(volumes: &[f64], paints: &[Paint]) -> f64 {
        let total: f64 = volumes.iter().map(|v| v.max(0.0)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        volumes
            .iter()
            .zip(paints)
            .map(|(&v, p)| v.max(0.0) * p.cost_per_ml.unwrap_or(0.0))
            .sum::<f64>()
            / total
    }
}
