use serde::{Deserialize, Serialize};

use crate::models::color::LabColor;

/// Kubelka-Munk optical coefficients for a paint layer.
///
/// `k` is absorption, `s` is scattering, both >= 0. A paint with both at
/// zero is treated as uncalibrated and mixed by LAB averaging instead of
/// the spectral model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalProperties {
    pub k: f64,
    pub s: f64,
}

impl OpticalProperties {
    pub const fn new(k: f64, s: f64) -> Self {
        Self { k, s }
    }

    /// Whether calibration data is present.
    pub fn is_calibrated(&self) -> bool {
        self.k > 0.0 || self.s > 0.0
    }
}

/// A single paint available for mixing.
///
/// Supplied by the caller per optimization call and never mutated by the
/// engine, so one catalog can be shared across concurrent calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub optical: OpticalProperties,
    pub lab: LabColor,
    /// Covering power, 0..1.
    pub opacity: f64,
    /// How strongly the paint pulls a mixture toward itself, 0..1.
    pub tinting_strength: f64,
    #[serde(default)]
    pub cost_per_ml: Option<f64>,
}

impl Paint {
    /// Convenience constructor for a paint known only by its mass tone.
    pub fn from_lab(id: impl Into<String>, name: impl Into<String>, lab: LabColor) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            brand: String::new(),
            optical: OpticalProperties::new(0.0, 0.0),
            lab,
            opacity: 1.0,
            tinting_strength: 1.0,
            cost_per_ml: None,
        }
    }
}
