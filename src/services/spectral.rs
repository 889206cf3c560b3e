//! Spectral reflectance support for the optical mixing model.
//!
//! Paints are mixed in Kubelka-Munk space, which needs a reflectance
//! curve per paint, but callers only supply a mass-tone LAB color. This
//! module recovers the smoothest physically-plausible reflectance curve
//! that reproduces a given linear-RGB color: reflectance is
//! tanh-parameterized to stay in (0, 1), curve roughness is minimized,
//! and a Lagrange term pins the integrated color to the input. The
//! resulting nonlinear system is solved by Newton iteration, LU first
//! and an SVD pseudo-inverse when the Jacobian goes singular.
//!
//! The observer matrix is renormalized at construction so that a perfect
//! reflector integrates to exactly the D65 white point used by
//! `services::color` - the spectral path and the matrix path then agree
//! to rounding error.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::models::{LabColor, MixError, Result};
use crate::services::color::{self, D65_WHITE, XYZ_TO_RGB};

/// Number of wavelength bands: 400..700 nm in 10 nm steps.
pub const BANDS: usize = 31;

const MAX_ITER: usize = 300;
const FTOL: f64 = 1e-7;
/// Largest acceptable RGB residual for a non-converged best iterate.
const RESIDUAL_LIMIT: f64 = 5e-3;

// CIE 1931 2-degree color matching functions, 400-700 nm / 10 nm.
const X_BAR: [f64; BANDS] = [
    0.0143, 0.0435, 0.1344, 0.2839, 0.3483, 0.3362, 0.2908, 0.1954, 0.0956, 0.0320, 0.0049,
    0.0093, 0.0633, 0.1655, 0.2904, 0.4334, 0.5945, 0.7621, 0.9163, 1.0263, 1.0622, 1.0026,
    0.8544, 0.6424, 0.4479, 0.2835, 0.1649, 0.0874, 0.0468, 0.0227, 0.0114,
];
const Y_BAR: [f64; BANDS] = [
    0.0004, 0.0012, 0.0040, 0.0116, 0.0230, 0.0380, 0.0600, 0.0910, 0.1390, 0.2080, 0.3230,
    0.5030, 0.7100, 0.8620, 0.9540, 0.9950, 0.9950, 0.9520, 0.8700, 0.7570, 0.6310, 0.5030,
    0.3810, 0.2650, 0.1750, 0.1070, 0.0610, 0.0320, 0.0170, 0.0082, 0.0041,
];
const Z_BAR: [f64; BANDS] = [
    0.0679, 0.2074, 0.6456, 1.3856, 1.7471, 1.7721, 1.6692, 1.2876, 0.8130, 0.4652, 0.2720,
    0.1582, 0.0782, 0.0422, 0.0203, 0.0087, 0.0039, 0.0021, 0.0017, 0.0011, 0.0008, 0.0003,
    0.0002, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000,
];
// D65 relative spectral power distribution on the same grid.
const D65_SPD: [f64; BANDS] = [
    82.75, 91.49, 93.43, 86.68, 104.86, 117.01, 117.81, 114.86, 115.92, 108.81, 109.35, 107.80,
    104.79, 107.69, 104.41, 104.05, 100.00, 96.33, 95.79, 88.69, 90.01, 89.60, 87.70, 83.29,
    83.70, 80.03, 80.21, 82.28, 78.28, 69.72, 71.61,
];

/// Precomputed observer: wavelength-to-XYZ and wavelength-to-linear-RGB
/// integration weights. Build once per optimization call.
pub struct Observer {
    /// 3 x BANDS, rows X/Y/Z. Row sums equal `D65_WHITE` exactly.
    t: Array2<f64>,
    /// 3 x BANDS, rows R/G/B in linear light: `XYZ_TO_RGB * t`.
    a: DMatrix<f64>,
    /// Second-difference roughness matrix for the recovery solve.
    roughness: DMatrix<f64>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        let mut t = Array2::zeros((3, BANDS));
        for i in 0..BANDS {
            t[[0, i]] = D65_SPD[i] * X_BAR[i];
            t[[1, i]] = D65_SPD[i] * Y_BAR[i];
            t[[2, i]] = D65_SPD[i] * Z_BAR[i];
        }
        // Pin the perfect reflector to the exact white point shared with
        // the matrix conversion path.
        for c in 0..3 {
            let row_sum: f64 = (0..BANDS).map(|i| t[[c, i]]).sum();
            let scale = D65_WHITE[c] / row_sum;
            for i in 0..BANDS {
                t[[c, i]] *= scale;
            }
        }

        let mut a = DMatrix::zeros(3, BANDS);
        for r in 0..3 {
            for i in 0..BANDS {
                a[(r, i)] = XYZ_TO_RGB[r][0] * t[[0, i]]
                    + XYZ_TO_RGB[r][1] * t[[1, i]]
                    + XYZ_TO_RGB[r][2] * t[[2, i]];
            }
        }

        let mut roughness = DMatrix::zeros(BANDS, BANDS);
        for i in 0..BANDS {
            roughness[(i, i)] = if i == 0 || i == BANDS - 1 { 2.0 } else { 4.0 };
            if i > 0 {
                roughness[(i, i - 1)] = -2.0;
            }
            if i < BANDS - 1 {
                roughness[(i, i + 1)] = -2.0;
            }
        }

        Self { t, a, roughness }
    }

    /// Integrate a reflectance curve to XYZ (Y of white = 1).
    pub fn reflectance_to_xyz(&self, reflectance: &Array1<f64>) -> [f64; 3] {
        let mut xyz = [0.0; 3];
        for (c, out) in xyz.iter_mut().enumerate() {
            *out = (0..BANDS).map(|i| self.t[[c, i]] * reflectance[i]).sum();
        }
        xyz
    }

    /// Integrate a reflectance curve straight to LAB.
    pub fn reflectance_to_lab(&self, reflectance: &Array1<f64>) -> LabColor {
        color::xyz_to_lab(self.reflectance_to_xyz(reflectance))
    }

    /// Recover the smoothest reflectance curve whose integrated color is
    /// `linear_rgb` (each channel 0..1).
    pub fn recover_reflectance(&self, linear_rgb: [f64; 3]) -> Result<Array1<f64>> {
        // Flat shortcuts for the achromatic extremes.
        if linear_rgb.iter().all(|&c| c <= 1e-4) {
            return Ok(Array1::from_elem(BANDS, 1e-4));
        }
        if linear_rgb.iter().all(|&c| c >= 1.0 - 1e-4) {
            return Ok(Array1::from_elem(BANDS, 1.0));
        }
        // Fully saturated channels make the constraint surface graze the
        // boundary of the tanh parameterization; nudging inward keeps the
        // Newton step well-conditioned at an imperceptible color shift.
        let target = DVector::from_iterator(
            3,
            linear_rgb.iter().map(|&c| c.clamp(5e-4, 1.0 - 5e-4)),
        );

        let n = BANDS;
        let mut z = DVector::<f64>::zeros(n);
        let mut lambda = DVector::<f64>::zeros(3);

        let mut best_z = z.clone();
        let mut best_residual = f64::MAX;

        for _ in 0..MAX_ITER {
            let d0 = z.map(|v| (v.tanh() + 1.0) / 2.0);
            let d1 = z.map(|v| {
                let sech = 1.0 / v.cosh();
                sech * sech / 2.0
            });
            let d2 = z.map(|v| {
                let sech = 1.0 / v.cosh();
                -sech * sech * v.tanh()
            });

            // Stationarity of the Lagrangian and the color constraint.
            let at_lambda = self.a.transpose() * &lambda;
            let f1 = &self.roughness * &z + d1.component_mul(&at_lambda);
            let f2 = &self.a * &d0 - &target;

            let residual = f2.norm();
            if residual < best_residual {
                best_residual = residual;
                best_z = z.clone();
            }

            let mut f = DVector::zeros(n + 3);
            f.rows_mut(0, n).copy_from(&f1);
            f.rows_mut(n, 3).copy_from(&f2);

            if f.amax() < FTOL {
                return Ok(curve_from(&z));
            }

            let mut jac = DMatrix::zeros(n + 3, n + 3);
            // d(F1)/dz = roughness + diag(d2 .* A'lambda)
            for i in 0..n {
                for j in 0..n {
                    jac[(i, j)] = self.roughness[(i, j)];
                }
                jac[(i, i)] += d2[i] * at_lambda[i];
            }
            // d(F1)/dlambda = diag(d1) A',  d(F2)/dz = A diag(d1)
            for i in 0..n {
                for c in 0..3 {
                    jac[(i, n + c)] = d1[i] * self.a[(c, i)];
                    jac[(n + c, i)] = self.a[(c, i)] * d1[i];
                }
            }

            let step = solve_newton_step(&jac, &(-f))?;
            for i in 0..n {
                z[i] += step[i];
            }
            for c in 0..3 {
                lambda[c] += step[n + c];
            }
        }

        // Difficult colors stop short of full convergence but the best
        // iterate is usually within a fraction of an RGB quantum.
        if best_residual < RESIDUAL_LIMIT {
            return Ok(curve_from(&best_z));
        }
        Err(MixError::Spectral(format!(
            "no convergence for rgb ({:.4}, {:.4}, {:.4}), residual {:.2e}",
            linear_rgb[0], linear_rgb[1], linear_rgb[2], best_residual
        )))
    }
}

fn curve_from(z: &DVector<f64>) -> Array1<f64> {
    Array1::from_iter(z.iter().map(|&v| ((v.tanh() + 1.0) / 2.0).clamp(0.0, 1.0)))
}

fn solve_newton_step(jac: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
    if let Some(step) = jac.clone().lu().solve(rhs) {
        return Ok(step);
    }
    // Singular Jacobian: fall back to the SVD pseudo-inverse.
    let svd = jac.clone().svd(true, true);
    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| MixError::Spectral("SVD left factor missing".into()))?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| MixError::Spectral("SVD right factor missing".into()))?;
    let mut ut_rhs = u.transpose() * rhs;
    for (i, &s) in svd.singular_values.iter().enumerate() {
        ut_rhs[i] = if s.abs() > 1e-10 { ut_rhs[i] / s } else { 0.0 };
    }
    Ok(v_t.transpose() * ut_rhs)
}
