// Typed payload layouts
//
// The firmware has no tolerance for alternate encodings, so each command's
// payload is built and parsed here and nowhere else.
//
// Layouts:
// - SET_FREQUENCY: u32 Hz, byte order depends on the transport variant
// - SET_GAIN:      i32 little-endian, gain x 100
// - TAR_EMF:       f64 LE depth + f64 LE signal (16 bytes)
// - LINE_MODE:     f64 LE line length + u32 LE point count (12 bytes)
// - UT_EMF:        ASCII "<unitId>:<status>"
// - flags:         1 byte, 0x00 = off, anything else = on
// - measurement:   f64 LE frequency, magnitude, phase, temperature (32 bytes)

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Byte order of a fixed-width integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

fn require_len(command: &'static str, payload: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if payload.len() != expected {
        return Err(ProtocolError::MalformedPayload {
            command,
            reason: format!("expected {} bytes, got {}", expected, payload.len()),
        });
    }
    Ok(())
}

fn f64_le_at(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

fn u32_at(bytes: &[u8], offset: usize, order: ByteOrder) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    match order {
        ByteOrder::Little => u32::from_le_bytes(buf),
        ByteOrder::Big => u32::from_be_bytes(buf),
    }
}

/// 1-byte enable flag
pub fn encode_flag(enable: bool) -> [u8; 1] {
    [u8::from(enable)]
}

pub fn decode_flag(command: &'static str, payload: &[u8]) -> Result<bool, ProtocolError> {
    require_len(command, payload, 1)?;
    Ok(payload[0] != 0)
}

/// Encode gain as `round(gain * 100)` in a little-endian i32
pub fn encode_gain(gain: f64) -> [u8; 4] {
    let scaled = (gain * 100.0).round() as i32;
    scaled.to_le_bytes()
}

/// Raw integer carried by a SET_GAIN payload
pub fn decode_gain_raw(payload: &[u8]) -> Result<i32, ProtocolError> {
    require_len("SET_GAIN", payload, 4)?;
    Ok(u32_at(payload, 0, ByteOrder::Little) as i32)
}

/// Inverse of [`encode_gain`]
pub fn decode_gain(payload: &[u8]) -> Result<f64, ProtocolError> {
    decode_gain_raw(payload).map(|raw| raw as f64 / 100.0)
}

pub fn encode_frequency(hz: u32, order: ByteOrder) -> [u8; 4] {
    match order {
        ByteOrder::Little => hz.to_le_bytes(),
        ByteOrder::Big => hz.to_be_bytes(),
    }
}

pub fn decode_frequency(payload: &[u8], order: ByteOrder) -> Result<u32, ProtocolError> {
    require_len("SET_FREQUENCY", payload, 4)?;
    Ok(u32_at(payload, 0, order))
}

/// TAR_EMF payload: target depth and signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetEmf {
    pub depth: f64,
    pub signal: f64,
}

impl TargetEmf {
    pub const LEN: usize = 16;

    pub fn encode(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&self.depth.to_le_bytes());
        out[8..16].copy_from_slice(&self.signal.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        require_len("TAR_EMF", payload, Self::LEN)?;
        Ok(Self {
            depth: f64_le_at(payload, 0),
            signal: f64_le_at(payload, 8),
        })
    }
}

/// LINE_MODE payload: scan line length and number of points along it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMode {
    pub length: f64,
    pub points: u32,
}

impl LineMode {
    pub const LEN: usize = 12;

    pub fn encode(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..8].copy_from_slice(&self.length.to_le_bytes());
        out[8..12].copy_from_slice(&self.points.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        require_len("LINE_MODE", payload, Self::LEN)?;
        Ok(Self {
            length: f64_le_at(payload, 0),
            points: u32_at(payload, 8, ByteOrder::Little),
        })
    }
}

/// UT_EMF payload: `"<unitId>:<status>"` in ASCII
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub unit_id: String,
    pub status: String,
}

impl UnitStatus {
    pub fn new(unit_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            status: status.into(),
        }
    }

    /// Encode as ASCII; the unit id must not contain the `:` separator
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if !self.unit_id.is_ascii() || !self.status.is_ascii() {
            return Err(ProtocolError::MalformedPayload {
                command: "UT_EMF",
                reason: "unit id and status must be ASCII".to_string(),
            });
        }
        if self.unit_id.contains(':') {
            return Err(ProtocolError::MalformedPayload {
                command: "UT_EMF",
                reason: format!("unit id {:?} contains ':'", self.unit_id),
            });
        }
        Ok(format!("{}:{}", self.unit_id, self.status).into_bytes())
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if !payload.is_ascii() {
            return Err(ProtocolError::MalformedPayload {
                command: "UT_EMF",
                reason: "payload is not ASCII".to_string(),
            });
        }
        // ASCII is valid UTF-8
        let text = String::from_utf8_lossy(payload);
        let (unit_id, status) =
            text.split_once(':')
                .ok_or_else(|| ProtocolError::MalformedPayload {
                    command: "UT_EMF",
                    reason: format!("missing ':' separator in {:?}", text),
                })?;
        Ok(Self::new(unit_id, status))
    }
}

/// Measurement frame streamed by the device after START_MEASUREMENT
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    /// Carrier frequency (Hz)
    pub frequency: f64,
    /// Raw signal magnitude in device units (0-1000 when valid)
    pub magnitude: f64,
    /// Phase (radians)
    pub phase: f64,
    /// Probe temperature (°C)
    pub temperature: f64,
}

impl RawMeasurement {
    pub const LEN: usize = 32;

    pub fn encode(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&self.frequency.to_le_bytes());
        out[8..16].copy_from_slice(&self.magnitude.to_le_bytes());
        out[16..24].copy_from_slice(&self.phase.to_le_bytes());
        out[24..32].copy_from_slice(&self.temperature.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        require_len("START_MEASUREMENT", payload, Self::LEN)?;
        Ok(Self {
            frequency: f64_le_at(payload, 0),
            magnitude: f64_le_at(payload, 8),
            phase: f64_le_at(payload, 16),
            temperature: f64_le_at(payload, 24),
        })
    }
}
