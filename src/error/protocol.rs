// Protocol codec error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Protocol error code constants
///
/// Error code range: 3001-3008
pub struct ProtocolErrorCodes {}

impl ProtocolErrorCodes {
    /// Frame shorter than header + command + length + checksum
    pub const TOO_SHORT: i32 = 3001;

    /// Recomputed checksum differs from the transmitted one
    pub const CHECKSUM_MISMATCH: i32 = 3002;

    /// First byte is not the frame marker
    pub const INVALID_HEADER: i32 = 3003;

    /// Declared payload length disagrees with the bytes present
    pub const LENGTH_MISMATCH: i32 = 3004;

    /// Command byte not present in the active command table
    pub const UNKNOWN_COMMAND: i32 = 3005;

    /// Payload does not fit the 16-bit length field
    pub const INVALID_PAYLOAD_SIZE: i32 = 3006;

    /// Payload bytes do not match the layout required by the command
    pub const MALFORMED_PAYLOAD: i32 = 3007;

    /// Command has no code in the selected transport variant
    pub const UNSUPPORTED_COMMAND: i32 = 3008;
}

/// Log a protocol error with structured context
pub fn log_protocol_error(err: &ProtocolError, context: &str) {
    error!(
        "Protocol error in {}: code={}, component=ProtocolCodec, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Protocol codec errors
///
/// Every failure to build or parse a frame is reported through one of these
/// variants. A corrupted frame is never coerced into a default packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Fewer than 5 bytes were supplied
    TooShort { len: usize },

    /// Checksum byte disagrees with the recomputed sum
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Frame does not start with the header marker
    InvalidHeader { found: u8 },

    /// Declared payload length differs from the bytes available
    LengthMismatch { declared: usize, available: usize },

    /// Command byte is not in the command table
    UnknownCommand { code: u8 },

    /// Payload exceeds the 16-bit length field
    InvalidPayloadSize { size: usize },

    /// Payload layout is wrong for the command
    MalformedPayload { command: &'static str, reason: String },

    /// Command is not available on this transport variant
    UnsupportedCommand {
        command: &'static str,
        variant: &'static str,
    },
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> i32 {
        match self {
            ProtocolError::TooShort { .. } => ProtocolErrorCodes::TOO_SHORT,
            ProtocolError::ChecksumMismatch { .. } => ProtocolErrorCodes::CHECKSUM_MISMATCH,
            ProtocolError::InvalidHeader { .. } => ProtocolErrorCodes::INVALID_HEADER,
            ProtocolError::LengthMismatch { .. } => ProtocolErrorCodes::LENGTH_MISMATCH,
            ProtocolError::UnknownCommand { .. } => ProtocolErrorCodes::UNKNOWN_COMMAND,
            ProtocolError::InvalidPayloadSize { .. } => ProtocolErrorCodes::INVALID_PAYLOAD_SIZE,
            ProtocolError::MalformedPayload { .. } => ProtocolErrorCodes::MALFORMED_PAYLOAD,
            ProtocolError::UnsupportedCommand { .. } => ProtocolErrorCodes::UNSUPPORTED_COMMAND,
        }
    }

    fn message(&self) -> String {
        match self {
            ProtocolError::TooShort { len } => {
                format!("Frame too short: need at least 5 bytes, got {}", len)
            }
            ProtocolError::ChecksumMismatch { expected, actual } => {
                format!(
                    "Checksum mismatch: expected {:#04x}, got {:#04x}",
                    expected, actual
                )
            }
            ProtocolError::InvalidHeader { found } => {
                format!("Invalid header marker {:#04x}", found)
            }
            ProtocolError::LengthMismatch {
                declared,
                available,
            } => {
                format!(
                    "Length mismatch: header declares {} payload bytes, frame carries {}",
                    declared, available
                )
            }
            ProtocolError::UnknownCommand { code } => {
                format!("Unknown command byte {:#04x}", code)
            }
            ProtocolError::InvalidPayloadSize { size } => {
                format!("Payload of {} bytes exceeds the 65535 byte limit", size)
            }
            ProtocolError::MalformedPayload { command, reason } => {
                format!("Malformed {} payload: {}", command, reason)
            }
            ProtocolError::UnsupportedCommand { command, variant } => {
                format!("{} is not supported on the {} transport", command, variant)
            }
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProtocolError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ProtocolError {}
