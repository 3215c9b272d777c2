// Device response dispatch
//
// Every inbound packet is turned into one DeviceResponse variant by an
// exhaustive match over the logical command, so a new command cannot be
// added without deciding how its response is parsed.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

use super::command::{CommandKind, WireCommand};
use super::packet::Packet;
use super::payload::{self, LineMode, RawMeasurement, TargetEmf, UnitStatus};

/// Parsed device response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceResponse {
    /// Empty-payload acknowledgement of a command
    Ack { command: CommandKind },
    /// One streamed measurement sample
    Measurement(RawMeasurement),
    /// Frequency the device switched to
    FrequencyConfirmed { hz: u32 },
    /// Gain the device applied
    GainConfirmed { gain: f64 },
    /// Device status byte
    Status { code: u8 },
    /// Firmware version string
    Version { version: String },
    /// Enable flag echoed by CALIBRATE or AUTOBALANCE
    Flag { command: CommandKind, enabled: bool },
    /// Target depth/signal pair
    Target(TargetEmf),
    /// Unit status report
    Unit(UnitStatus),
    /// Line scan configuration
    Line(LineMode),
}

impl DeviceResponse {
    pub fn from_packet<C: WireCommand>(packet: &Packet<C>) -> Result<Self, ProtocolError> {
        let data = packet.payload();
        let kind = packet.command().kind();

        if data.is_empty() {
            return Ok(DeviceResponse::Ack { command: kind });
        }

        match kind {
            CommandKind::StartMeasurement => {
                RawMeasurement::decode(data).map(DeviceResponse::Measurement)
            }
            CommandKind::StopMeasurement => Err(ProtocolError::MalformedPayload {
                command: kind.name(),
                reason: format!("unexpected {} byte payload", data.len()),
            }),
            CommandKind::SetFrequency => Ok(DeviceResponse::FrequencyConfirmed {
                hz: payload::decode_frequency(data, C::FREQUENCY_ORDER)?,
            }),
            CommandKind::SetGain => Ok(DeviceResponse::GainConfirmed {
                gain: payload::decode_gain(data)?,
            }),
            CommandKind::GetStatus => Ok(DeviceResponse::Status { code: data[0] }),
            CommandKind::GetVersion => {
                if !data.is_ascii() {
                    return Err(ProtocolError::MalformedPayload {
                        command: kind.name(),
                        reason: "version string is not ASCII".to_string(),
                    });
                }
                Ok(DeviceResponse::Version {
                    version: String::from_utf8_lossy(data).trim_end_matches('\0').to_string(),
                })
            }
            CommandKind::Calibrate | CommandKind::Autobalance => Ok(DeviceResponse::Flag {
                command: kind,
                enabled: payload::decode_flag(kind.name(), data)?,
            }),
            CommandKind::TarEmf => TargetEmf::decode(data).map(DeviceResponse::Target),
            CommandKind::UtEmf => UnitStatus::decode(data).map(DeviceResponse::Unit),
            CommandKind::LineMode => LineMode::decode(data).map(DeviceResponse::Line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::{BleCommand, ProtocolVariant, SerialCommand};
    use crate::protocol::packet::encode;

    #[test]
    fn test_measurement_frame() {
        let raw = RawMeasurement {
            frequency: 22_600.0,
            magnitude: 300.0,
            phase: 0.1,
            temperature: 30.0,
        };
        let frame = encode(SerialCommand::StartMeasurement, &raw.encode()).unwrap();

        let response = ProtocolVariant::Serial.decode_response(&frame).unwrap();
        assert_eq!(response, DeviceResponse::Measurement(raw));
    }

    #[test]
    fn test_empty_payload_is_ack() {
        let frame = encode(BleCommand::StopMeasurement, &[]).unwrap();
        let response = ProtocolVariant::Ble.decode_response(&frame).unwrap();
        assert_eq!(
            response,
            DeviceResponse::Ack {
                command: CommandKind::StopMeasurement
            }
        );
    }

    #[test]
    fn test_version_string_trims_padding() {
        let frame = encode(SerialCommand::GetVersion, b"FW 2.14\0\0").unwrap();
        let response = ProtocolVariant::Serial.decode_response(&frame).unwrap();
        assert_eq!(
            response,
            DeviceResponse::Version {
                version: "FW 2.14".to_string()
            }
        );
    }

    #[test]
    fn test_status_and_flags() {
        let frame = encode(SerialCommand::GetStatus, &[0x03]).unwrap();
        assert_eq!(
            ProtocolVariant::Serial.decode_response(&frame).unwrap(),
            DeviceResponse::Status { code: 3 }
        );

        let frame = encode(BleCommand::Calibrate, &[0x01]).unwrap();
        assert_eq!(
            ProtocolVariant::Ble.decode_response(&frame).unwrap(),
            DeviceResponse::Flag {
                command: CommandKind::Calibrate,
                enabled: true
            }
        );
    }

    #[test]
    fn test_truncated_measurement_is_malformed() {
        let frame = encode(SerialCommand::StartMeasurement, &[0u8; 24]).unwrap();
        assert!(matches!(
            ProtocolVariant::Serial.decode_response(&frame),
            Err(ProtocolError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_frequency_confirmation_uses_variant_byte_order() {
        let frame = encode(BleCommand::SetFrequency, &45_000u32.to_be_bytes()).unwrap();
        assert_eq!(
            ProtocolVariant::Ble.decode_response(&frame).unwrap(),
            DeviceResponse::FrequencyConfirmed { hz: 45_000 }
        );
    }
}
