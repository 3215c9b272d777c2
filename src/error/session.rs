// Device session error types and constants

use crate::error::{AutobalanceError, ErrorCode, ProtocolError};
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 6001-6005
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Transport refused or failed to send bytes
    pub const TRANSPORT: i32 = 6001;

    /// Encoding an outbound command failed
    pub const PROTOCOL: i32 = 6002;

    /// Frequency index or value not accepted in the configured mode
    pub const INVALID_FREQUENCY: i32 = 6003;

    /// Operation not allowed in the current session state
    pub const INVALID_STATE: i32 = 6004;

    /// Autobalance correction could not be applied
    pub const AUTOBALANCE: i32 = 6005;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=DeviceSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Device session errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Transport collaborator reported a failure
    Transport { reason: String },

    /// Outbound command could not be encoded
    Protocol(ProtocolError),

    /// Frequency rejected by the configured frequency mode
    InvalidFrequency { requested: String, allowed: String },

    /// Session is in the wrong lifecycle state
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Autobalance collaborator failed
    Autobalance(AutobalanceError),
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Transport { .. } => SessionErrorCodes::TRANSPORT,
            SessionError::Protocol(_) => SessionErrorCodes::PROTOCOL,
            SessionError::InvalidFrequency { .. } => SessionErrorCodes::INVALID_FREQUENCY,
            SessionError::InvalidState { .. } => SessionErrorCodes::INVALID_STATE,
            SessionError::Autobalance(_) => SessionErrorCodes::AUTOBALANCE,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Transport { reason } => format!("Transport failure: {}", reason),
            SessionError::Protocol(err) => format!("Protocol failure: {}", err.message()),
            SessionError::InvalidFrequency { requested, allowed } => {
                format!("Frequency {} not allowed (expected {})", requested, allowed)
            }
            SessionError::InvalidState { operation, state } => {
                format!("Cannot {} while session is {}", operation, state)
            }
            SessionError::Autobalance(err) => format!("Autobalance failure: {}", err.message()),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Protocol(err) => Some(err),
            SessionError::Autobalance(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        SessionError::Protocol(err)
    }
}

impl From<AutobalanceError> for SessionError {
    fn from(err: AutobalanceError) -> Self {
        SessionError::Autobalance(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_wraps_protocol_error() {
        let err: SessionError = ProtocolError::InvalidPayloadSize { size: 70_000 }.into();
        assert_eq!(err.code(), SessionErrorCodes::PROTOCOL);
        assert!(err.message().contains("70000"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = SessionError::InvalidState {
            operation: "start measurement",
            state: "Idle",
        };
        assert_eq!(
            err.message(),
            "Cannot start measurement while session is Idle"
        );
    }
}
