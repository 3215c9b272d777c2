// Reading and MeasurementEngine
//
// MeasurementEngine turns one raw device measurement into a Reading:
// gate -> calibration -> depth -> depth policy -> classification -> confidence.
// It holds only immutable configuration, so a single engine can be shared
// across threads.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::MeasurementConfig;
use crate::error::MeasurementError;
use crate::protocol::RawMeasurement;

use super::calibration::{calibrate_signal, confidence, estimate_depth};
use super::classifier::{classify, signal_ratio, MaterialType};
use super::gate::MeasurementGate;

/// One accepted, calibrated and classified measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Carrier frequency (Hz)
    pub frequency: f64,
    /// Raw signal magnitude (device units)
    pub raw_signal: f64,
    pub phase: f64,
    /// Probe temperature (°C)
    pub temperature: f64,
    pub calibrated_signal: f64,
    /// Estimated depth (m), never negative
    pub depth: f64,
    pub material: MaterialType,
    /// Quality score in [0, 1]
    pub confidence: f64,
}

/// Stateless measurement pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementEngine {
    gate: MeasurementGate,
}

impl MeasurementEngine {
    pub fn new(gate: MeasurementGate) -> Self {
        Self { gate }
    }

    pub fn from_config(config: &MeasurementConfig) -> Self {
        Self::new(MeasurementGate::new(config.limits, config.negative_depth))
    }

    pub fn gate(&self) -> &MeasurementGate {
        &self.gate
    }

    /// Process one raw measurement
    ///
    /// # Errors
    /// - `InvalidMeasurement` if the gate rejects the raw fields
    /// - `NegativeDepth` under the reject policy
    pub fn process(
        &self,
        raw: &RawMeasurement,
        timestamp_ms: u64,
    ) -> Result<Reading, MeasurementError> {
        self.gate.validate(raw)?;

        let calibrated_signal = calibrate_signal(raw.magnitude, raw.temperature);
        let gated = self
            .gate
            .apply_depth_policy(estimate_depth(calibrated_signal))?;

        let material = classify(signal_ratio(raw.magnitude, raw.frequency), gated.depth);
        let confidence = confidence(
            raw.magnitude,
            calibrated_signal,
            raw.temperature,
            gated.clamped,
        );

        Ok(Reading {
            timestamp_ms,
            frequency: raw.frequency,
            raw_signal: raw.magnitude,
            phase: raw.phase,
            temperature: raw.temperature,
            calibrated_signal,
            depth: gated.depth,
            material,
            confidence,
        })
    }

    /// Process with the current wall-clock time as timestamp
    pub fn process_now(&self, raw: &RawMeasurement) -> Result<Reading, MeasurementError> {
        self.process(raw, now_ms())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
