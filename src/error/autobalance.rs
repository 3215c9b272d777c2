// Autobalance error types and constants

use crate::autobalance::{AutobalancePhase, PhaseState};
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Autobalance error code constants
///
/// Error code range: 5001-5006
pub struct AutobalanceErrorCodes {}

impl AutobalanceErrorCodes {
    /// Phase ended with fewer points than the minimum
    pub const INSUFFICIENT_SAMPLES: i32 = 5001;

    /// Operation not allowed while a phase is collecting
    pub const ALREADY_ACTIVE: i32 = 5002;

    /// Writing or clearing the persisted state failed
    pub const PERSISTENCE_FAILURE: i32 = 5003;

    /// Autobalance state mutex was poisoned
    pub const STATE_POISONED: i32 = 5004;

    /// Phase is not collecting
    pub const NOT_ACTIVE: i32 = 5005;

    /// Requested transition is not valid from the current phase state
    pub const INVALID_TRANSITION: i32 = 5006;
}

/// Log an autobalance error with structured context
pub fn log_autobalance_error(err: &AutobalanceError, context: &str) {
    error!(
        "Autobalance error in {}: code={}, component=AutobalanceController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Autobalance calibration errors
#[derive(Debug, Clone, PartialEq)]
pub enum AutobalanceError {
    /// Too few calibration points when the phase finished
    InsufficientCalibrationSamples {
        phase: AutobalancePhase,
        required: usize,
        collected: usize,
    },

    /// A phase is collecting and the operation would clobber it
    CalibrationAlreadyActive { phase: AutobalancePhase },

    /// Durable storage rejected the write
    PersistenceFailure { reason: String },

    /// Autobalance mutex was poisoned
    StatePoisoned,

    /// Phase is not currently collecting
    NotActive { phase: AutobalancePhase },

    /// Phase state does not allow the requested transition
    InvalidTransition {
        phase: AutobalancePhase,
        from: PhaseState,
    },
}

impl ErrorCode for AutobalanceError {
    fn code(&self) -> i32 {
        match self {
            AutobalanceError::InsufficientCalibrationSamples { .. } => {
                AutobalanceErrorCodes::INSUFFICIENT_SAMPLES
            }
            AutobalanceError::CalibrationAlreadyActive { .. } => {
                AutobalanceErrorCodes::ALREADY_ACTIVE
            }
            AutobalanceError::PersistenceFailure { .. } => {
                AutobalanceErrorCodes::PERSISTENCE_FAILURE
            }
            AutobalanceError::StatePoisoned => AutobalanceErrorCodes::STATE_POISONED,
            AutobalanceError::NotActive { .. } => AutobalanceErrorCodes::NOT_ACTIVE,
            AutobalanceError::InvalidTransition { .. } => {
                AutobalanceErrorCodes::INVALID_TRANSITION
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AutobalanceError::InsufficientCalibrationSamples {
                phase,
                required,
                collected,
            } => {
                format!(
                    "Insufficient {} calibration samples: need {}, got {}",
                    phase.display_name(),
                    required,
                    collected
                )
            }
            AutobalanceError::CalibrationAlreadyActive { phase } => {
                format!("{} calibration already in progress", phase.display_name())
            }
            AutobalanceError::PersistenceFailure { reason } => {
                format!("Failed to persist autobalance state: {}", reason)
            }
            AutobalanceError::StatePoisoned => "Autobalance state lock poisoned".to_string(),
            AutobalanceError::NotActive { phase } => {
                format!("{} calibration is not collecting", phase.display_name())
            }
            AutobalanceError::InvalidTransition { phase, from } => {
                format!(
                    "{} calibration cannot transition from {:?}",
                    phase.display_name(),
                    from
                )
            }
        }
    }
}

impl fmt::Display for AutobalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AutobalanceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AutobalanceError {}

impl From<std::io::Error> for AutobalanceError {
    fn from(err: std::io::Error) -> Self {
        AutobalanceError::PersistenceFailure {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AutobalanceError {
    fn from(err: serde_json::Error) -> Self {
        AutobalanceError::PersistenceFailure {
            reason: err.to_string(),
        }
    }
}
