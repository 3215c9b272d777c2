// Signal calibration and depth model
//
// Pure functions over one measurement's raw fields. None of them fail: the
// only rejection point is the validity gate, which runs before these.
//
// Model:
// - tempCompensation = 1 + (T - 25) * 0.002   (0.2 %/°C drift, anchored at 25 °C)
// - calibrated       = raw * (3333 / 1000) * tempCompensation
// - depth            = -ln(calibrated / 1000) / 0.417   for calibrated > 0, else 0

/// Scalar converting raw device units to calibrated magnitude
pub const CALIBRATION_CONSTANT: f64 = 3333.0;

/// Temperature the drift model is anchored at (°C)
pub const REFERENCE_TEMPERATURE: f64 = 25.0;

/// Relative drift per °C
pub const TEMPERATURE_COEFFICIENT: f64 = 0.002;

/// Empirical attenuation factor of the exponential depth inversion
pub const ATTENUATION_FACTOR: f64 = 0.417;

/// Full-scale raw signal and depth-model reference magnitude
pub const FULL_SCALE: f64 = 1000.0;

/// Temperature span over which confidence degrades to its floor (°C)
const CONFIDENCE_TEMPERATURE_SPAN: f64 = 60.0;

/// Linear first-order drift correction
#[inline]
pub fn temperature_compensation(temperature: f64) -> f64 {
    1.0 + (temperature - REFERENCE_TEMPERATURE) * TEMPERATURE_COEFFICIENT
}

/// Calibrated signal magnitude
#[inline]
pub fn calibrate_signal(raw_signal: f64, temperature: f64) -> f64 {
    raw_signal * (CALIBRATION_CONSTANT / FULL_SCALE) * temperature_compensation(temperature)
}

/// Depth estimate (m) by single-exponential decay inversion
///
/// Unclamped: a calibrated signal above 1000 yields a negative depth. The
/// plausibility policy lives in [`MeasurementGate`](super::MeasurementGate).
pub fn estimate_depth(calibrated_signal: f64) -> f64 {
    if calibrated_signal > 0.0 {
        -(calibrated_signal / FULL_SCALE).ln() / ATTENUATION_FACTOR
    } else {
        0.0
    }
}

/// Quality score in `[0, 1]`
///
/// Product of a signal term (raw strength relative to full scale) and a
/// temperature term that falls from 1.0 at 25 °C to 0.5 at ±60 °C away.
/// Zero when the calibrated signal is not positive, halved when the depth
/// had to be clamped.
pub fn confidence(raw_signal: f64, calibrated_signal: f64, temperature: f64, depth_clamped: bool) -> f64 {
    if calibrated_signal.is_nan() || calibrated_signal <= 0.0 {
        return 0.0;
    }

    let signal_quality = (raw_signal / FULL_SCALE).clamp(0.0, 1.0);
    let drift = ((temperature - REFERENCE_TEMPERATURE).abs() / CONFIDENCE_TEMPERATURE_SPAN).min(1.0);
    let temperature_quality = 1.0 - 0.5 * drift;

    let score = signal_quality * temperature_quality;
    let score = if depth_clamped { score * 0.5 } else { score };
    score.clamp(0.0, 1.0)
}
