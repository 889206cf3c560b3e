//! Optical mixing model based on Kubelka-Munk theory.
//!
//! Pigments mix subtractively: the K/S (absorption over scattering)
//! ratios of the components combine linearly by concentration, not the
//! reflectances themselves. The model recovers a reflectance curve per
//! paint from its mass-tone LAB, converts per band to K/S, averages by
//! tinting-strength-weighted volume fraction and converts back through
//! the observer to a predicted LAB (the single-constant approximation).
//!
//! Paints without usable optical data degrade to plain volume-weighted
//! LAB averaging rather than failing; a mixture can carry both kinds at
//! once, blended by their share of the total volume.

use ndarray::Array1;

use crate::models::{LabColor, MixError, Paint, Result};
use crate::services::spectral::{Observer, BANDS};

/// Convert reflectance to the Kubelka-Munk K/S ratio: (1 - R)^2 / 2R.
#[inline]
pub fn reflectance_to_ks(r: f64) -> f64 {
    let r = r.clamp(0.001, 0.999);
    (1.0 - r).powi(2) / (2.0 * r)
}

/// Invert K/S back to reflectance: R = 1 + K/S - sqrt((K/S)^2 + 2 K/S).
#[inline]
pub fn ks_to_reflectance(ks: f64) -> f64 {
    if ks <= 0.0 {
        return 1.0;
    }
    (1.0 + ks - (ks * ks + 2.0 * ks).sqrt()).clamp(0.0, 1.0)
}

/// Per-paint optics resolved at model construction.
enum PaintOptics {
    /// K/S curve over the band grid, ready for linear mixing.
    Spectral(Array1<f64>),
    /// No calibration or recovery failed; mixed by LAB averaging.
    LabOnly,
}

/// Mixing model over a fixed set of paints.
///
/// Construction does the expensive spectral recovery once; `predict` is
/// then cheap enough to sit inside an optimizer's hot loop.
pub struct MixingModel {
    optics: Vec<PaintOptics>,
    labs: Vec<LabColor>,
    tints: Vec<f64>,
    observer: Observer,
}

impl MixingModel {
    pub fn new(paints: &[Paint]) -> Self {
        let observer = Observer::new();
        let mut optics = Vec::with_capacity(paints.len());
        for paint in paints {
            optics.push(resolve_optics(&observer, paint));
        }
        Self {
            optics,
            labs: paints.iter().map(|p| p.lab).collect(),
            tints: paints.iter().map(|p| p.tinting_strength.clamp(0.0, 1.0)).collect(),
            observer,
        }
    }

    pub fn paint_count(&self) -> usize {
        self.labs.len()
    }

    /// Predict the color of mixing the model's paints at the given
    /// volumes (ml). Zero volumes contribute nothing.
    pub fn predict(&self, volumes: &[f64]) -> Result<LabColor> {
        if volumes.len() != self.labs.len() {
            return Err(MixError::InvalidInput(format!(
                "{} volumes for {} paints",
                volumes.len(),
                self.labs.len()
            )));
        }
        let total: f64 = volumes.iter().map(|v| v.max(0.0)).sum();
        if total <= 0.0 {
            return Err(MixError::InvalidInput("all volumes are zero".into()));
        }

        // Tinting-strength-weighted concentrations for the spectral
        // paints; raw volume fractions for the LAB fallback blend.
        let mut ks_weight_sum = 0.0;
        let mut mixed_ks = Array1::<f64>::zeros(BANDS);
        let mut fallback_fraction = 0.0;
        let mut fallback_lab = [0.0f64; 3];

        for (i, &raw) in volumes.iter().enumerate() {
            let volume = raw.max(0.0);
            if volume == 0.0 {
                continue;
            }
            let fraction = volume / total;
            match &self.optics[i] {
                PaintOptics::Spectral(ks) => {
                    let weight = volume * self.tints[i].max(1e-6);
                    mixed_ks = mixed_ks + ks * weight;
                    ks_weight_sum += weight;
                }
                PaintOptics::LabOnly => {
                    let lab = &self.labs[i];
                    fallback_lab[0] += lab.l * fraction;
                    fallback_lab[1] += lab.a * fraction;
                    fallback_lab[2] += lab.b * fraction;
                    fallback_fraction += fraction;
                }
            }
        }

        if ks_weight_sum <= 0.0 {
            // Everything fell back: plain volume-weighted average.
            let f = fallback_fraction;
            return Ok(LabColor::new(
                fallback_lab[0] / f,
                fallback_lab[1] / f,
                fallback_lab[2] / f,
            ));
        }

        let reflectance = (mixed_ks / ks_weight_sum).mapv(ks_to_reflectance);
        let spectral_lab = self.observer.reflectance_to_lab(&reflectance);

        if fallback_fraction <= 0.0 {
            return Ok(spectral_lab);
        }
        // Blend the spectral prediction with the uncalibrated share.
        let spectral_fraction = 1.0 - fallback_fraction;
        Ok(LabColor::new(
            spectral_lab.l * spectral_fraction + fallback_lab[0],
            spectral_lab.a * spectral_fraction + fallback_lab[1],
            spectral_lab.b * spectral_fraction + fallback_lab[2],
        ))
    }
}

/// Recover a paint's K/S curve, or mark it for the LAB fallback.
fn resolve_optics(observer: &Observer, paint: &Paint) -> PaintOptics {
    if !paint.optical.is_calibrated() {
        return PaintOptics::LabOnly;
    }
    let linear_rgb = crate::services::color::lab_to_linear_rgb(&paint.lab);
    match observer.recover_reflectance(linear_rgb) {
        Ok(curve) => {
            let mut ks = curve.mapv(reflectance_to_ks);
            // Supplied coefficients set the broadband K/S level; the
            // mass tone keeps supplying the spectral shape. k == s
            // leaves the mass tone unchanged.
            if paint.optical.s > 0.0 {
                let ratio = paint.optical.k / paint.optical.s;
                if (ratio - 1.0).abs() > f64::EPSILON {
                    ks *= ratio;
                }
            }
            PaintOptics::Spectral(ks)
        }
        Err(_) => PaintOptics::LabOnly,
    }
}

/// One-shot contract: build a model for `paints` and predict `volumes`.
pub fn predict_mixed_color(paints: &[Paint], volumes: &[f64]) -> Result<LabColor> {
    if paints.is_empty() {
        return Err(MixError::InvalidInput("no paints to mix".into()));
    }
    MixingModel::new(paints).predict(volumes)
}
