//! # paintmix
//!
//! Color-mixing optimization engine. Given a target color and a set of
//! candidate paints, searches for a volumetric mixture whose predicted
//! optical result minimizes perceptual color difference, subject to
//! volume and paint-count constraints.
//!
//! The optical model is Kubelka-Munk layered absorption/scattering, the
//! difference metric is CIEDE2000, and the search runs either a
//! differential-evolution population or a TPE (tree-structured Parzen
//! estimator) sequential sampler with local refinement, chosen per
//! request.
//!
//! Every call is self-contained and CPU-bound: the paint catalog is
//! read-only input, nothing is shared between invocations, and
//! concurrent calls need no coordination. Unreachable targets and
//! exhausted time budgets come back as normal results carrying
//! `target_met = false` or `early_termination = true`, never as errors.
//!
//! ## Example
//!
//! ```rust
//! use paintmix::{optimize, LabColor, OptimizationRequest, Paint};
//!
//! let paints = vec![
//!     Paint::from_lab("tw", "Titanium White", LabColor::new(96.0, -0.5, 1.2)),
//!     Paint::from_lab("ib", "Ivory Black", LabColor::new(12.0, 0.3, -0.4)),
//! ];
//! let request = OptimizationRequest::new(LabColor::new(60.0, 0.0, 0.0), paints);
//! let result = optimize(&request)?;
//! println!("dE {:.2}, {} paints", result.formula.delta_e, result.formula.paint_ratios.len());
//! # Ok::<(), paintmix::MixError>(())
//! ```

pub mod models;
pub mod services;

pub use models::{
    AccuracyRating, Algorithm, LabColor, MixError, MixingComplexity, MixingFormula,
    OpticalProperties, OptimizationMetrics, OptimizationRequest, OptimizationResult, Paint,
    PaintRatio, Preferences, RgbColor, VolumeConstraints,
};
pub use services::color::{hex_to_lab, lab_to_hex, lab_to_rgb, rgb_to_lab};
pub use services::delta_e::delta_e;
pub use services::kubelka_munk::predict_mixed_color;
pub use services::orchestrator::optimize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_types_round_trip_through_serde() {
        let formula = MixingFormula {
            paint_ratios: vec![PaintRatio {
                paint_id: "tw".into(),
                volume_ml: 10.0,
                percentage: 100.0,
            }],
            total_volume_ml: 10.0,
            delta_e: 0.4,
            accuracy_rating: AccuracyRating::Excellent,
            mixing_complexity: MixingComplexity::Simple,
            opacity: 1.0,
            kubelka_munk_k: 0.5,
            kubelka_munk_s: 0.5,
        };
        let json = serde_json::to_string(&formula).unwrap();
        let back: MixingFormula = serde_json::from_str(&json).unwrap();
        assert_eq!(formula, back);
    }
}
