// MeasurementGate - validity gate and negative-depth policy
//
// A measurement is accepted only when every raw field is finite and within
// the device operating range. Rejected measurements never reach
// classification. The gate also owns what happens when the depth model
// returns a negative depth (calibrated signal above the reference).

use serde::{Deserialize, Serialize};

use crate::error::MeasurementError;
use crate::protocol::RawMeasurement;

/// What to do with a negative depth from the decay inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeDepthPolicy {
    /// Report depth 0 and halve the confidence
    #[default]
    ClampToZero,
    /// Fail with `NegativeDepth`
    Reject,
}

/// Accepted ranges of the raw fields (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementLimits {
    pub min_signal: f64,
    pub max_signal: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl Default for MeasurementLimits {
    fn default() -> Self {
        Self {
            min_signal: 0.0,
            max_signal: 1000.0,
            min_temperature: -40.0,
            max_temperature: 85.0,
        }
    }
}

/// Depth after the policy was applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedDepth {
    pub depth: f64,
    pub clamped: bool,
}

/// Validity gate applied before calibration and classification
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementGate {
    limits: MeasurementLimits,
    policy: NegativeDepthPolicy,
}

impl MeasurementGate {
    pub fn new(limits: MeasurementLimits, policy: NegativeDepthPolicy) -> Self {
        Self { limits, policy }
    }

    pub fn limits(&self) -> &MeasurementLimits {
        &self.limits
    }

    pub fn policy(&self) -> NegativeDepthPolicy {
        self.policy
    }

    /// Check the raw fields of one measurement
    ///
    /// # Errors
    /// `InvalidMeasurement` naming the first offending field. Checked in
    /// order: non-finite values, signal range, frequency, temperature.
    pub fn validate(&self, raw: &RawMeasurement) -> Result<(), MeasurementError> {
        let fields = [
            ("signal", raw.magnitude),
            ("frequency", raw.frequency),
            ("phase", raw.phase),
            ("temperature", raw.temperature),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("{} is not finite ({})", name, value)));
        }

        let limits = &self.limits;
        if raw.magnitude < limits.min_signal || raw.magnitude > limits.max_signal {
            return Err(invalid(format!(
                "signal {} outside [{}, {}]",
                raw.magnitude, limits.min_signal, limits.max_signal
            )));
        }

        if raw.frequency <= 0.0 {
            return Err(invalid(format!(
                "frequency {} Hz must be positive",
                raw.frequency
            )));
        }

        if raw.temperature < limits.min_temperature || raw.temperature > limits.max_temperature {
            return Err(invalid(format!(
                "temperature {} °C outside [{}, {}]",
                raw.temperature, limits.min_temperature, limits.max_temperature
            )));
        }

        Ok(())
    }

    /// Apply the negative-depth policy to a computed depth
    pub fn apply_depth_policy(&self, computed: f64) -> Result<GatedDepth, MeasurementError> {
        if computed >= 0.0 {
            return Ok(GatedDepth {
                depth: computed,
                clamped: false,
            });
        }

        match self.policy {
            NegativeDepthPolicy::ClampToZero => Ok(GatedDepth {
                depth: 0.0,
                clamped: true,
            }),
            NegativeDepthPolicy::Reject => Err(MeasurementError::NegativeDepth { computed }),
        }
    }
}

fn invalid(reason: String) -> MeasurementError {
    MeasurementError::InvalidMeasurement { reason }
}
