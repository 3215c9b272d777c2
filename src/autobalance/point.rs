// Sensor samples and the calibration points collected from them

use serde::{Deserialize, Serialize};

use super::phase::AutobalancePhase;

/// One (x, y, z) sample from the external sensor feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl SensorSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// All three axes are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A sample accepted by a collecting phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp_ms: u64,
    pub phase: AutobalancePhase,
}

impl CalibrationPoint {
    pub fn from_sample(sample: &SensorSample, phase: AutobalancePhase) -> Self {
        Self {
            x: sample.x,
            y: sample.y,
            z: sample.z,
            timestamp_ms: sample.timestamp_ms,
            phase,
        }
    }
}

/// Per-axis arithmetic mean of a non-empty point set
pub(crate) fn mean_xyz(points: &[CalibrationPoint]) -> Option<(f64, f64, f64)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let (sx, sy, sz) = points.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sz), p| {
        (sx + p.x, sy + p.y, sz + p.z)
    });
    Some((sx / n, sy / n, sz / n))
}
