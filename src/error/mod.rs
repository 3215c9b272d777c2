// Error types for the EMF probe core
//
// This module defines one error enum per component (protocol codec,
// measurement engine, autobalance, device session). Every enum carries a
// stable numeric code so that callers on the other side of a transport or
// UI boundary can react without string matching.

mod autobalance;
mod measurement;
mod protocol;
mod session;

pub use autobalance::{log_autobalance_error, AutobalanceError, AutobalanceErrorCodes};
pub use measurement::{log_measurement_error, MeasurementError, MeasurementErrorCodes};
pub use protocol::{log_protocol_error, ProtocolError, ProtocolErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
