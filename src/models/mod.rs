//! Data types crossing the engine boundary: colors, paints, requests,
//! formulas and errors.

pub mod color;
pub mod error;
pub mod formula;
pub mod paint;
pub mod request;

pub use color::{LabColor, RgbColor};
pub use error::{MixError, Result};
pub use formula::{
    AccuracyRating, MixingComplexity, MixingFormula, OptimizationMetrics, OptimizationResult,
    PaintRatio,
};
pub use paint::{OpticalProperties, Paint};
pub use request::{
    Algorithm, OptimizationRequest, Preferences, VolumeConstraints, MAX_SUPPORTED_PAINT_COUNT,
};
