//! Small numeric helpers shared by the feed scorers.

/// Round half away from zero to `decimals` places.
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let r = (x * factor).round() / factor;
    // keep "-0.0" out of JSON
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

pub fn round2(x: f64) -> f64 {
    round_to(x, 2)
}

pub fn round1(x: f64) -> f64 {
    round_to(x, 1)
}

/// Clamp into [0,1]; NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
