//! Color space conversions between hex/sRGB and CIE L*a*b*.
//!
//! All conversions assume the D65 illuminant with the 2-degree observer
//! and are pure functions; the only failure mode is a malformed hex
//! string.

use crate::models::{LabColor, MixError, Result, RgbColor};

/// D65 reference white, XYZ with Y normalized to 1.
pub const D65_WHITE: [f64; 3] = [0.95047, 1.0, 1.08883];

// sRGB <-> XYZ matrices (IEC 61966-2-1, D65).
pub(crate) const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];
pub(crate) const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// sRGB gamma expansion, 0..1 in and out.
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB gamma compression, 0..1 in and out.
pub fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

fn lab_f_inv(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

/// XYZ (Y normalized to 1) to LAB.
pub fn xyz_to_lab(xyz: [f64; 3]) -> LabColor {
    let fx = lab_f(xyz[0] / D65_WHITE[0]);
    let fy = lab_f(xyz[1] / D65_WHITE[1]);
    let fz = lab_f(xyz[2] / D65_WHITE[2]);
    LabColor {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// LAB to XYZ (Y normalized to 1).
pub fn lab_to_xyz(lab: &LabColor) -> [f64; 3] {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;
    [
        D65_WHITE[0] * lab_f_inv(fx),
        D65_WHITE[1] * lab_f_inv(fy),
        D65_WHITE[2] * lab_f_inv(fz),
    ]
}

/// 8-bit sRGB to LAB.
pub fn rgb_to_lab(rgb: RgbColor) -> LabColor {
    let r = srgb_to_linear(rgb.r as f64 / 255.0);
    let g = srgb_to_linear(rgb.g as f64 / 255.0);
    let b = srgb_to_linear(rgb.b as f64 / 255.0);
    let xyz = [
        RGB_TO_XYZ[0][0] * r + RGB_TO_XYZ[0][1] * g + RGB_TO_XYZ[0][2] * b,
        RGB_TO_XYZ[1][0] * r + RGB_TO_XYZ[1][1] * g + RGB_TO_XYZ[1][2] * b,
        RGB_TO_XYZ[2][0] * r + RGB_TO_XYZ[2][1] * g + RGB_TO_XYZ[2][2] * b,
    ];
    xyz_to_lab(xyz)
}

/// LAB to linear RGB, clamped to the sRGB gamut, 0..1 per channel.
pub fn lab_to_linear_rgb(lab: &LabColor) -> [f64; 3] {
    let xyz = lab_to_xyz(lab);
    let mut rgb = [0.0; 3];
    for (i, row) in XYZ_TO_RGB.iter().enumerate() {
        let v = row[0] * xyz[0] + row[1] * xyz[1] + row[2] * xyz[2];
        rgb[i] = v.clamp(0.0, 1.0);
    }
    rgb
}

/// LAB to 8-bit sRGB with gamut clamping.
pub fn lab_to_rgb(lab: &LabColor) -> RgbColor {
    let lin = lab_to_linear_rgb(lab);
    let quantize = |c: f64| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8;
    RgbColor {
        r: quantize(lin[0]),
        g: quantize(lin[1]),
        b: quantize(lin[2]),
    }
}

/// Parse a 6-digit hex color, with or without leading '#'.
pub fn hex_to_rgb(hex: &str) -> Result<RgbColor> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MixError::Format(format!(
            "expected 6-digit hex color, got '{hex}'"
        )));
    }
    let byte = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|e| MixError::Format(format!("'{hex}': {e}")))
    };
    Ok(RgbColor {
        r: byte(0..2)?,
        g: byte(2..4)?,
        b: byte(4..6)?,
    })
}

pub fn rgb_to_hex(rgb: RgbColor) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb.r, rgb.g, rgb.b)
}

pub fn hex_to_lab(hex: &str) -> Result<LabColor> {
    Ok(rgb_to_lab(hex_to_rgb(hex)?))
}

pub fn lab_to_hex(lab: &LabColor) -> String {
    rgb_to_hex(lab_to_rgb(lab))
}
