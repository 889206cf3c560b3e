use serde::{Deserialize, Serialize};

use crate::models::color::LabColor;
use crate::models::error::MixError;
use crate::models::paint::Paint;

/// Optimization algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DifferentialEvolution,
    TpeHybrid,
    Auto,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Auto
    }
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::DifferentialEvolution => "differential_evolution",
            Algorithm::TpeHybrid => "tpe_hybrid",
            Algorithm::Auto => "auto",
        }
    }
}

/// Bounds on the total mixed volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConstraints {
    pub min_total_volume_ml: f64,
    pub max_total_volume_ml: f64,
    #[serde(default = "default_true")]
    pub allow_scaling: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VolumeConstraints {
    fn default() -> Self {
        Self {
            min_total_volume_ml: 5.0,
            max_total_volume_ml: 1000.0,
            allow_scaling: true,
        }
    }
}

/// Non-exclusive optimization preference flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preferences {
    #[serde(default)]
    pub prioritize_accuracy: bool,
    #[serde(default)]
    pub prioritize_cost: bool,
    #[serde(default)]
    pub prioritize_speed: bool,
}

/// One color-matching request. Created per call, fully consumed by it.
///
/// Unknown fields are rejected at deserialization so loosely-typed
/// callers cannot smuggle options past the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizationRequest {
    pub target_color: LabColor,
    pub available_paints: Vec<Paint>,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default = "default_max_paint_count")]
    pub max_paint_count: usize,
    #[serde(default)]
    pub volume_constraints: VolumeConstraints,
    #[serde(default = "default_accuracy_target")]
    pub accuracy_target: f64,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    #[serde(default)]
    pub preferences: Preferences,
    /// Pins the random source for reproducible runs; production callers
    /// leave it unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_paint_count() -> usize {
    5
}

fn default_accuracy_target() -> f64 {
    2.0
}

fn default_time_limit_ms() -> u64 {
    28_000
}

/// Hard ceiling on paints per formula; mixtures beyond this are not
/// practical to reproduce by hand.
pub const MAX_SUPPORTED_PAINT_COUNT: usize = 5;

impl OptimizationRequest {
    /// Request with engine defaults for everything but target and paints.
    pub fn new(target_color: LabColor, available_paints: Vec<Paint>) -> Self {
        Self {
            target_color,
            available_paints,
            algorithm: Algorithm::Auto,
            max_paint_count: default_max_paint_count(),
            volume_constraints: VolumeConstraints::default(),
            accuracy_target: default_accuracy_target(),
            time_limit_ms: default_time_limit_ms(),
            preferences: Preferences::default(),
            seed: None,
        }
    }

    /// Structural validation; all failures here are fatal to the call and
    /// surface before any optimization work is done.
    pub fn validate(&self) -> Result<(), MixError> {
        if self.available_paints.is_empty() {
            return Err(MixError::Validation("no paints supplied".into()));
        }
        if self.max_paint_count < 2 || self.max_paint_count > MAX_SUPPORTED_PAINT_COUNT {
            return Err(MixError::Validation(format!(
                "max_paint_count {} outside supported range 2..={}",
                self.max_paint_count, MAX_SUPPORTED_PAINT_COUNT
            )));
        }
        let vc = &self.volume_constraints;
        if vc.min_total_volume_ml <= 0.0 || vc.max_total_volume_ml <= 0.0 {
            return Err(MixError::Validation(
                "volume bounds must be positive".into(),
            ));
        }
        if vc.min_total_volume_ml > vc.max_total_volume_ml {
            return Err(MixError::Validation(format!(
                "min volume {} exceeds max volume {}",
                vc.min_total_volume_ml, vc.max_total_volume_ml
            )));
        }
        if self.accuracy_target <= 0.0 {
            return Err(MixError::Validation(
                "accuracy target must be positive".into(),
            ));
        }
        if self.time_limit_ms == 0 {
            return Err(MixError::Validation("time limit must be positive".into()));
        }
        for paint in &self.available_paints {
            if paint.optical.k < 0.0 || paint.optical.s < 0.0 {
                return Err(MixError::Validation(format!(
                    "paint '{}' has negative optical coefficients",
                    paint.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Paint {
        Paint::from_lab("w", "Titanium White", LabColor::new(96.0, -0.5, 1.2))
    }

    #[test]
    fn defaults_are_valid() {
        let req = OptimizationRequest::new(
            LabColor::new(50.0, 0.0, 0.0),
            vec![white(), white()],
        );
        assert!(req.validate().is_ok());
        assert_eq!(req.max_paint_count, 5);
        assert_eq!(req.time_limit_ms, 28_000);
        assert!((req.accuracy_target - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_empty_paint_list() {
        let req = OptimizationRequest::new(LabColor::new(50.0, 0.0, 0.0), vec![]);
        assert!(matches!(req.validate(), Err(MixError::Validation(_))));
    }

    #[test]
    fn rejects_inverted_volume_bounds() {
        let mut req = OptimizationRequest::new(
            LabColor::new(50.0, 0.0, 0.0),
            vec![white(), white()],
        );
        req.volume_constraints.min_total_volume_ml = 100.0;
        req.volume_constraints.max_total_volume_ml = 10.0;
        assert!(matches!(req.validate(), Err(MixError::Validation(_))));
    }

    #[test]
    fn rejects_out_of_range_paint_count() {
        let mut req = OptimizationRequest::new(
            LabColor::new(50.0, 0.0, 0.0),
            vec![white(), white()],
        );
        req.max_paint_count = 1;
        assert!(req.validate().is_err());
        req.max_paint_count = 6;
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_request_fields_are_rejected() {
        let json = r#"{
            "target_color": {"l": 50.0, "a": 0.0, "b": 0.0},
            "available_paints": [],
            "definitely_not_a_field": 1
        }"#;
        assert!(serde_json::from_str::<OptimizationRequest>(json).is_err());
    }
}
