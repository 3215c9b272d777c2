// Measurement error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Measurement error code constants
///
/// Error code range: 4001-4002
pub struct MeasurementErrorCodes {}

impl MeasurementErrorCodes {
    /// Reading failed the validity gate
    pub const INVALID_MEASUREMENT: i32 = 4001;

    /// Depth model produced a negative depth and the policy rejects it
    pub const NEGATIVE_DEPTH: i32 = 4002;
}

/// Log a measurement error with structured context
///
/// Rejected readings are routine in the field, so they are logged at warn
/// level rather than error.
pub fn log_measurement_error(err: &MeasurementError, context: &str) {
    warn!(
        "Measurement rejected in {}: code={}, component=MeasurementGate, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Measurement-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// Raw fields outside the accepted operating range
    InvalidMeasurement { reason: String },

    /// Depth inversion went negative under the reject policy
    NegativeDepth { computed: f64 },
}

impl ErrorCode for MeasurementError {
    fn code(&self) -> i32 {
        match self {
            MeasurementError::InvalidMeasurement { .. } => {
                MeasurementErrorCodes::INVALID_MEASUREMENT
            }
            MeasurementError::NegativeDepth { .. } => MeasurementErrorCodes::NEGATIVE_DEPTH,
        }
    }

    fn message(&self) -> String {
        match self {
            MeasurementError::InvalidMeasurement { reason } => {
                format!("Invalid measurement: {}", reason)
            }
            MeasurementError::NegativeDepth { computed } => {
                format!("Depth model returned negative depth {:.3} m", computed)
            }
        }
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MeasurementError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for MeasurementError {}
