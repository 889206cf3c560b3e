use serde::{Deserialize, Serialize};

/// How close the predicted mixture landed to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl AccuracyRating {
    /// Conventional CIEDE2000 tiers.
    pub fn from_delta_e(delta_e: f64) -> Self {
        if delta_e <= 1.0 {
            AccuracyRating::Excellent
        } else if delta_e <= 2.0 {
            AccuracyRating::Good
        } else if delta_e <= 4.0 {
            AccuracyRating::Acceptable
        } else {
            AccuracyRating::Poor
        }
    }
}

/// Practical difficulty of reproducing a formula at the easel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixingComplexity {
    Simple,
    Moderate,
    Complex,
}

impl MixingComplexity {
    pub fn from_paint_count(count: usize) -> Self {
        match count {
            0..=2 => MixingComplexity::Simple,
            3 => MixingComplexity::Moderate,
            _ => MixingComplexity::Complex,
        }
    }
}

/// One paint's share of a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintRatio {
    pub paint_id: String,
    pub volume_ml: f64,
    /// Share of the total volume; ratios across a formula sum to 100.
    pub percentage: f64,
}

/// Final recipe for reproducing the target color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingFormula {
    pub paint_ratios: Vec<PaintRatio>,
    pub total_volume_ml: f64,
    pub delta_e: f64,
    pub accuracy_rating: AccuracyRating,
    pub mixing_complexity: MixingComplexity,
    /// Volume-weighted opacity of the mixture, 0..1.
    pub opacity: f64,
    pub kubelka_munk_k: f64,
    pub kubelka_munk_s: f64,
}

/// Bookkeeping about how the optimization run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub iterations_completed: usize,
    pub time_elapsed_ms: u64,
    pub algorithm_used: String,
    pub convergence_achieved: bool,
    pub target_met: bool,
    pub initial_best_delta_e: f64,
    pub final_best_delta_e: f64,
    /// Fraction of the initial error removed, 0 when nothing improved.
    pub improvement_rate: f64,
    pub early_termination: bool,
}

/// Everything a caller gets back from one optimization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub formula: MixingFormula,
    pub metrics: OptimizationMetrics,
    /// Up to three trade-off candidates, best trade-off score first.
    pub alternatives: Vec<MixingFormula>,
}
