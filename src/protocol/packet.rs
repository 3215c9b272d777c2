//! Frame encoding and decoding
//!
//! Wire layout of one frame:
//!
//! ```text
//! [0xAA] [CMD] [LEN lo] [LEN hi] [PAYLOAD ...] [CHECKSUM]
//! ```
//!
//! - `LEN` is the payload byte count as little-endian `u16`
//! - `CHECKSUM` is `(header + command + length + Σpayload) mod 256`, with
//!   the length added as one `u16` value, so only `LEN lo` contributes
//!
//! `decode` validates the checksum before anything else. A corrupted
//! `LEN hi` is invisible to the checksum and surfaces as
//! [`ProtocolError::LengthMismatch`] instead.

use crate::error::ProtocolError;

use super::command::WireCommand;

/// Frame start marker
pub const HEADER: u8 = 0xAA;

/// Header + command + 2 length bytes + checksum
pub const FRAME_OVERHEAD: usize = 5;

/// Bytes preceding the payload
pub const PAYLOAD_OFFSET: usize = 4;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// 8-bit wrapping sum of a byte slice
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frame checksum: `(header + command + length + Σpayload) mod 256`
///
/// `length` is added as a single `u16`; modulo 256 that is its low byte.
#[inline]
pub fn frame_checksum(header: u8, command: u8, length: u16, payload: &[u8]) -> u8 {
    header
        .wrapping_add(command)
        .wrapping_add(length as u8)
        .wrapping_add(checksum(payload))
}

/// Frame checksum recomputed from received bytes (checksum byte excluded)
///
/// `body` must hold at least header, command and both length bytes.
pub(crate) fn body_checksum(body: &[u8]) -> u8 {
    let length = u16::from_le_bytes([body[2], body[3]]);
    frame_checksum(body[0], body[1], length, &body[PAYLOAD_OFFSET..])
}

/// One validated protocol frame
///
/// Immutable once built: either constructed for an outbound command through
/// [`Packet::new`] or produced by [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Packet<C> {
    command: C,
    payload: Vec<u8>,
    checksum: u8,
}

impl<C: WireCommand> Packet<C> {
    /// Build a packet, computing its checksum
    ///
    /// # Errors
    /// `InvalidPayloadSize` if the payload does not fit the length field.
    pub fn new(command: C, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::InvalidPayloadSize {
                size: payload.len(),
            });
        }

        let checksum = frame_checksum(HEADER, command.code(), payload.len() as u16, &payload);

        Ok(Self {
            command,
            payload,
            checksum,
        })
    }

    pub fn command(&self) -> C {
        self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Total frame length on the wire
    pub fn frame_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.push(HEADER);
        frame.push(self.command.code());
        frame.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame.push(self.checksum);
        frame
    }
}

/// Encode a command and raw payload into a frame
///
/// # Errors
/// `InvalidPayloadSize` if `payload.len() > 65535`.
pub fn encode<C: WireCommand>(command: C, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Packet::new(command, payload.to_vec()).map(|packet| packet.to_bytes())
}

/// Decode exactly one frame
///
/// Checks, in order: minimum size, checksum, header marker, declared
/// length, command lookup. Pure; unknown commands are reported rather than
/// dropped so callers decide whether to log or ignore them.
pub fn decode<C: WireCommand>(bytes: &[u8]) -> Result<Packet<C>, ProtocolError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(ProtocolError::TooShort { len: bytes.len() });
    }

    let (body, tail) = bytes.split_at(bytes.len() - 1);
    let expected = body_checksum(body);
    let actual = tail[0];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    if bytes[0] != HEADER {
        return Err(ProtocolError::InvalidHeader { found: bytes[0] });
    }

    let declared = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
    let available = bytes.len() - FRAME_OVERHEAD;
    if declared != available {
        return Err(ProtocolError::LengthMismatch {
            declared,
            available,
        });
    }

    let command = C::from_code(bytes[1]).ok_or(ProtocolError::UnknownCommand { code: bytes[1] })?;

    Ok(Packet {
        command,
        payload: body[PAYLOAD_OFFSET..].to_vec(),
        checksum: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::{BleCommand, SerialCommand};

    #[test]
    fn test_start_measurement_frame() {
        let frame = encode(SerialCommand::StartMeasurement, &[]).unwrap();
        // AA 01 00 00 [AB]
        assert_eq!(frame, vec![0xAA, 0x01, 0x00, 0x00, 0xAB]);
    }

    #[test]
    fn test_checksum_adds_length_as_one_value() {
        let payload = vec![0x10; 300];
        let frame = encode(SerialCommand::UtEmf, &payload).unwrap();

        // 300 = 0x012C -> LEN bytes 2C 01
        assert_eq!(frame[2], 0x2C);
        assert_eq!(frame[3], 0x01);

        let expected = 0xAAu32 + 0x0C + 300 + 0x10 * 300;
        assert_eq!(*frame.last().unwrap() as u32, expected % 256);
    }

    #[test]
    fn test_checksum_for_256_byte_payload() {
        let frame = encode(SerialCommand::UtEmf, &[0u8; 256]).unwrap();

        // 0xAA + 0x0C + 256 = 438 = 0x1B6
        assert_eq!(&frame[2..4], &[0x00, 0x01]);
        assert_eq!(*frame.last().unwrap(), 0xB6);

        let packet: Packet<SerialCommand> = decode(&frame).unwrap();
        assert_eq!(packet.checksum(), 0xB6);
    }

    #[test]
    fn test_corrupt_length_high_byte_is_length_mismatch() {
        let mut frame = encode(SerialCommand::GetVersion, b"1.0").unwrap();
        frame[3] = 0x01;

        assert_eq!(
            decode::<SerialCommand>(&frame),
            Err(ProtocolError::LengthMismatch {
                declared: 259,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let payload = [0x01, 0x02, 0x03, 0xFE];
        let frame = encode(SerialCommand::SetGain, &payload).unwrap();
        let packet: Packet<SerialCommand> = decode(&frame).unwrap();

        assert_eq!(packet.command(), SerialCommand::SetGain);
        assert_eq!(packet.payload(), &payload);
        assert_eq!(packet.to_bytes(), frame);
    }

    #[test]
    fn test_decode_too_short() {
        let result = decode::<SerialCommand>(&[0xAA, 0x01, 0x00, 0x00]);
        assert_eq!(result, Err(ProtocolError::TooShort { len: 4 }));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut frame = encode(SerialCommand::GetVersion, &[]).unwrap();
        let last = frame.len() - 1;
        frame[last] = frame[last].wrapping_add(1);

        assert!(matches!(
            decode::<SerialCommand>(&frame),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_header_with_valid_checksum() {
        let mut frame = vec![0x55, 0x01, 0x00, 0x00];
        frame.push(checksum(&frame));

        assert_eq!(
            decode::<SerialCommand>(&frame),
            Err(ProtocolError::InvalidHeader { found: 0x55 })
        );
    }

    #[test]
    fn test_decode_length_exceeds_frame() {
        let mut frame = vec![HEADER, 0x0B, 0x10, 0x00, 0x01, 0x02];
        frame.push(checksum(&frame));

        assert_eq!(
            decode::<SerialCommand>(&frame),
            Err(ProtocolError::LengthMismatch {
                declared: 16,
                available: 2
            })
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let mut frame = vec![HEADER, 0x09, 0x00, 0x00];
        frame.push(checksum(&frame));

        assert_eq!(
            decode::<SerialCommand>(&frame),
            Err(ProtocolError::UnknownCommand { code: 0x09 })
        );
    }

    #[test]
    fn test_same_frame_differs_per_variant() {
        // 0x04 is SET_GAIN on serial and SET_FREQUENCY on BLE
        let frame = encode(SerialCommand::SetGain, &[0xFA, 0, 0, 0]).unwrap();

        let serial: Packet<SerialCommand> = decode(&frame).unwrap();
        let ble: Packet<BleCommand> = decode(&frame).unwrap();

        assert_eq!(serial.command(), SerialCommand::SetGain);
        assert_eq!(ble.command(), BleCommand::SetFrequency);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode(SerialCommand::UtEmf, &payload),
            Err(ProtocolError::InvalidPayloadSize {
                size: MAX_PAYLOAD_LEN + 1
            })
        );
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = vec![0x5Au8; MAX_PAYLOAD_LEN];
        let frame = encode(SerialCommand::UtEmf, &payload).unwrap();
        assert_eq!(frame.len(), MAX_PAYLOAD_LEN + FRAME_OVERHEAD);

        let packet: Packet<SerialCommand> = decode(&frame).unwrap();
        assert_eq!(packet.payload().len(), MAX_PAYLOAD_LEN);
    }
}
