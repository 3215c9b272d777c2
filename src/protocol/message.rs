// Typed outbound commands
//
// DeviceCommand is the transport-neutral form used by the session. Encoding
// resolves the wire code and payload layout through the variant's command
// table; decoding is the inverse and is used for loopback checks and the CLI.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

use super::command::{BleCommand, CommandKind, ProtocolVariant, SerialCommand, WireCommand};
use super::packet::{self, Packet};
use super::payload::{self, LineMode, TargetEmf, UnitStatus};
use super::response::DeviceResponse;

/// Command with typed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceCommand {
    StartMeasurement,
    StopMeasurement,
    SetFrequency { hz: u32 },
    SetGain { gain: f64 },
    Calibrate { enable: bool },
    GetStatus,
    Autobalance { enable: bool },
    GetVersion,
    LineMode(LineMode),
    TarEmf(TargetEmf),
    UtEmf(UnitStatus),
}

impl DeviceCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            DeviceCommand::StartMeasurement => CommandKind::StartMeasurement,
            DeviceCommand::StopMeasurement => CommandKind::StopMeasurement,
            DeviceCommand::SetFrequency { .. } => CommandKind::SetFrequency,
            DeviceCommand::SetGain { .. } => CommandKind::SetGain,
            DeviceCommand::Calibrate { .. } => CommandKind::Calibrate,
            DeviceCommand::GetStatus => CommandKind::GetStatus,
            DeviceCommand::Autobalance { .. } => CommandKind::Autobalance,
            DeviceCommand::GetVersion => CommandKind::GetVersion,
            DeviceCommand::LineMode(_) => CommandKind::LineMode,
            DeviceCommand::TarEmf(_) => CommandKind::TarEmf,
            DeviceCommand::UtEmf(_) => CommandKind::UtEmf,
        }
    }

    /// Build the packet for a specific command table
    pub fn to_packet<C: WireCommand>(&self) -> Result<Packet<C>, ProtocolError> {
        let kind = self.kind();
        let wire = C::from_kind(kind).ok_or(ProtocolError::UnsupportedCommand {
            command: kind.name(),
            variant: C::VARIANT.name(),
        })?;

        let payload = match self {
            DeviceCommand::StartMeasurement
            | DeviceCommand::StopMeasurement
            | DeviceCommand::GetStatus
            | DeviceCommand::GetVersion => Vec::new(),
            DeviceCommand::SetFrequency { hz } => {
                payload::encode_frequency(*hz, C::FREQUENCY_ORDER).to_vec()
            }
            DeviceCommand::SetGain { gain } => payload::encode_gain(*gain).to_vec(),
            DeviceCommand::Calibrate { enable } => {
                if C::CALIBRATE_HAS_FLAG {
                    payload::encode_flag(*enable).to_vec()
                } else if *enable {
                    Vec::new()
                } else {
                    // the serial CALIBRATE is a bare trigger and cannot disable
                    return Err(ProtocolError::UnsupportedCommand {
                        command: "CALIBRATE(disable)",
                        variant: C::VARIANT.name(),
                    });
                }
            }
            DeviceCommand::Autobalance { enable } => payload::encode_flag(*enable).to_vec(),
            DeviceCommand::LineMode(line) => line.encode().to_vec(),
            DeviceCommand::TarEmf(target) => target.encode().to_vec(),
            DeviceCommand::UtEmf(unit) => unit.encode()?,
        };

        Packet::new(wire, payload)
    }

    /// Recover the typed command from a decoded packet
    pub fn from_packet<C: WireCommand>(packet: &Packet<C>) -> Result<Self, ProtocolError> {
        let data = packet.payload();
        let kind = packet.command().kind();
        let expect_empty = |command: DeviceCommand| {
            if data.is_empty() {
                Ok(command)
            } else {
                Err(ProtocolError::MalformedPayload {
                    command: kind.name(),
                    reason: format!("expected no payload, got {} bytes", data.len()),
                })
            }
        };

        match kind {
            CommandKind::StartMeasurement => expect_empty(DeviceCommand::StartMeasurement),
            CommandKind::StopMeasurement => expect_empty(DeviceCommand::StopMeasurement),
            CommandKind::GetStatus => expect_empty(DeviceCommand::GetStatus),
            CommandKind::GetVersion => expect_empty(DeviceCommand::GetVersion),
            CommandKind::SetFrequency => Ok(DeviceCommand::SetFrequency {
                hz: payload::decode_frequency(data, C::FREQUENCY_ORDER)?,
            }),
            CommandKind::SetGain => Ok(DeviceCommand::SetGain {
                gain: payload::decode_gain(data)?,
            }),
            CommandKind::Calibrate => {
                if C::CALIBRATE_HAS_FLAG {
                    Ok(DeviceCommand::Calibrate {
                        enable: payload::decode_flag(kind.name(), data)?,
                    })
                } else {
                    expect_empty(DeviceCommand::Calibrate { enable: true })
                }
            }
            CommandKind::Autobalance => Ok(DeviceCommand::Autobalance {
                enable: payload::decode_flag(kind.name(), data)?,
            }),
            CommandKind::LineMode => Ok(DeviceCommand::LineMode(LineMode::decode(data)?)),
            CommandKind::TarEmf => Ok(DeviceCommand::TarEmf(TargetEmf::decode(data)?)),
            CommandKind::UtEmf => Ok(DeviceCommand::UtEmf(UnitStatus::decode(data)?)),
        }
    }
}

impl ProtocolVariant {
    /// Encode a command with this variant's command table
    pub fn encode_command(self, command: &DeviceCommand) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ProtocolVariant::Serial => command
                .to_packet::<SerialCommand>()
                .map(|packet| packet.to_bytes()),
            ProtocolVariant::Ble => command
                .to_packet::<BleCommand>()
                .map(|packet| packet.to_bytes()),
        }
    }

    /// Decode a frame carrying an outbound command
    pub fn decode_command(self, frame: &[u8]) -> Result<DeviceCommand, ProtocolError> {
        match self {
            ProtocolVariant::Serial => {
                DeviceCommand::from_packet(&packet::decode::<SerialCommand>(frame)?)
            }
            ProtocolVariant::Ble => DeviceCommand::from_packet(&packet::decode::<BleCommand>(frame)?),
        }
    }

    /// Decode a device response frame
    pub fn decode_response(self, frame: &[u8]) -> Result<DeviceResponse, ProtocolError> {
        match self {
            ProtocolVariant::Serial => {
                DeviceResponse::from_packet(&packet::decode::<SerialCommand>(frame)?)
            }
            ProtocolVariant::Ble => {
                DeviceResponse::from_packet(&packet::decode::<BleCommand>(frame)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{decode, Packet};

    fn sample_commands() -> Vec<DeviceCommand> {
        vec![
            DeviceCommand::StartMeasurement,
            DeviceCommand::StopMeasurement,
            DeviceCommand::SetFrequency { hz: 68_000 },
            DeviceCommand::SetGain { gain: 2.5 },
            DeviceCommand::Calibrate { enable: true },
            DeviceCommand::GetStatus,
            DeviceCommand::Autobalance { enable: true },
            DeviceCommand::GetVersion,
            DeviceCommand::LineMode(LineMode {
                length: 2.0,
                points: 40,
            }),
            DeviceCommand::TarEmf(TargetEmf {
                depth: 0.8,
                signal: 640.0,
            }),
            DeviceCommand::UtEmf(UnitStatus::new("7", "OK")),
        ]
    }

    #[test]
    fn test_serial_round_trip_every_command() {
        for command in sample_commands() {
            let frame = ProtocolVariant::Serial.encode_command(&command).unwrap();
            let decoded = ProtocolVariant::Serial.decode_command(&frame).unwrap();
            assert_eq!(decoded, command, "round trip failed for {:?}", command);
        }
    }

    #[test]
    fn test_ble_round_trip_supported_commands() {
        for command in sample_commands() {
            match ProtocolVariant::Ble.encode_command(&command) {
                Ok(frame) => {
                    let decoded = ProtocolVariant::Ble.decode_command(&frame).unwrap();
                    assert_eq!(decoded, command);
                }
                Err(ProtocolError::UnsupportedCommand { command: name, .. }) => {
                    assert!(
                        name == "SET_GAIN" || name == "GET_STATUS",
                        "unexpected unsupported command {}",
                        name
                    );
                }
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_set_gain_scenario() {
        let frame = ProtocolVariant::Serial
            .encode_command(&DeviceCommand::SetGain { gain: 2.5 })
            .unwrap();

        let packet: Packet<SerialCommand> = decode(&frame).unwrap();
        assert_eq!(payload::decode_gain_raw(packet.payload()).unwrap(), 250);

        match DeviceCommand::from_packet(&packet).unwrap() {
            DeviceCommand::SetGain { gain } => assert_eq!(gain, 2.5),
            other => panic!("expected SetGain, got {:?}", other),
        }
    }

    #[test]
    fn test_set_frequency_codes_per_variant() {
        let command = DeviceCommand::SetFrequency { hz: 19_000 };

        let serial = ProtocolVariant::Serial.encode_command(&command).unwrap();
        assert_eq!(serial[1], 0x03);
        assert_eq!(&serial[4..8], &[0x38, 0x4A, 0x00, 0x00]);

        let ble = ProtocolVariant::Ble.encode_command(&command).unwrap();
        assert_eq!(ble[1], 0x04);
        assert_eq!(&ble[4..8], &[0x00, 0x00, 0x4A, 0x38]);
    }

    #[test]
    fn test_calibrate_layout_per_variant() {
        let serial = ProtocolVariant::Serial
            .encode_command(&DeviceCommand::Calibrate { enable: true })
            .unwrap();
        assert_eq!(serial[1], 0x05);
        assert_eq!(serial.len(), 5);

        let ble = ProtocolVariant::Ble
            .encode_command(&DeviceCommand::Calibrate { enable: false })
            .unwrap();
        assert_eq!(ble[1], 0x06);
        assert_eq!(ble[4], 0x00);

        assert!(matches!(
            ProtocolVariant::Serial.encode_command(&DeviceCommand::Calibrate { enable: false }),
            Err(ProtocolError::UnsupportedCommand { .. })
        ));
    }

    #[test]
    fn test_single_byte_corruption_is_checksum_mismatch() {
        for command in sample_commands() {
            let frame = ProtocolVariant::Serial.encode_command(&command).unwrap();
            for index in 0..frame.len() {
                for delta in [0x01u8, 0x80, 0xFF] {
                    let mut corrupted = frame.clone();
                    corrupted[index] = corrupted[index].wrapping_add(delta);
                    let result = decode::<SerialCommand>(&corrupted);
                    // LEN hi is not covered by the checksum
                    let detected = if index == 3 {
                        matches!(result, Err(ProtocolError::LengthMismatch { .. }))
                    } else {
                        matches!(result, Err(ProtocolError::ChecksumMismatch { .. }))
                    };
                    assert!(
                        detected,
                        "byte {} of {:?} corrupted by {:#04x} gave {:?}",
                        index,
                        command,
                        delta,
                        result
                    );
                }
            }
        }
    }

    #[test]
    fn test_command_payload_length_checked() {
        let frame = packet::encode(SerialCommand::StopMeasurement, &[0x01]).unwrap();
        assert!(matches!(
            ProtocolVariant::Serial.decode_command(&frame),
            Err(ProtocolError::MalformedPayload { .. })
        ));
    }
}
