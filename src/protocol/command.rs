// Command tables for the two transport variants
//
// The vendor tools disagree on command codes: SET_FREQUENCY is 0x03 on the
// serial link but 0x04 over BLE, where 0x04 would otherwise be SET_GAIN, and
// CALIBRATE moves from 0x05 to 0x06, colliding with GET_STATUS. Each variant
// therefore gets its own tagged enum, and the codec is generic over them.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::payload::ByteOrder;

/// Physical link the device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Wired serial link (vendor desktop tool)
    #[default]
    Serial,
    /// Bluetooth LE link (vendor mobile app)
    Ble,
}

impl ProtocolVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolVariant::Serial => "serial",
            ProtocolVariant::Ble => "ble",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical command, independent of any wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    StartMeasurement,
    StopMeasurement,
    SetFrequency,
    SetGain,
    Calibrate,
    GetStatus,
    Autobalance,
    GetVersion,
    LineMode,
    TarEmf,
    UtEmf,
}

impl CommandKind {
    /// Protocol name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::StartMeasurement => "START_MEASUREMENT",
            CommandKind::StopMeasurement => "STOP_MEASUREMENT",
            CommandKind::SetFrequency => "SET_FREQUENCY",
            CommandKind::SetGain => "SET_GAIN",
            CommandKind::Calibrate => "CALIBRATE",
            CommandKind::GetStatus => "GET_STATUS",
            CommandKind::Autobalance => "AUTOBALANCE",
            CommandKind::GetVersion => "GET_VERSION",
            CommandKind::LineMode => "LINE_MODE",
            CommandKind::TarEmf => "TAR_EMF",
            CommandKind::UtEmf => "UT_EMF",
        }
    }
}

/// A transport-specific command table
///
/// Implementors map their own codes to and from [`CommandKind`]. Lookups are
/// exhaustive matches, so adding a command is a compile-time change.
pub trait WireCommand: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Transport variant this table belongs to
    const VARIANT: ProtocolVariant;

    /// Byte order of the 4-byte SET_FREQUENCY payload
    const FREQUENCY_ORDER: ByteOrder;

    /// Whether CALIBRATE carries a 1-byte enable flag
    const CALIBRATE_HAS_FLAG: bool;

    /// Wire code of this command
    fn code(self) -> u8;

    /// Look up a command by wire code
    fn from_code(code: u8) -> Option<Self>;

    /// Logical command this code stands for
    fn kind(self) -> CommandKind;

    /// Wire command for a logical command, if the variant supports it
    fn from_kind(kind: CommandKind) -> Option<Self>;

    fn name(self) -> &'static str {
        self.kind().name()
    }
}

/// Command table of the wired serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialCommand {
    StartMeasurement,
    StopMeasurement,
    SetFrequency,
    SetGain,
    Calibrate,
    GetStatus,
    Autobalance,
    GetVersion,
    LineMode,
    TarEmf,
    UtEmf,
}

impl WireCommand for SerialCommand {
    const VARIANT: ProtocolVariant = ProtocolVariant::Serial;
    const FREQUENCY_ORDER: ByteOrder = ByteOrder::Little;
    const CALIBRATE_HAS_FLAG: bool = false;

    fn code(self) -> u8 {
        match self {
            SerialCommand::StartMeasurement => 0x01,
            SerialCommand::StopMeasurement => 0x02,
            SerialCommand::SetFrequency => 0x03,
            SerialCommand::SetGain => 0x04,
            SerialCommand::Calibrate => 0x05,
            SerialCommand::GetStatus => 0x06,
            SerialCommand::Autobalance => 0x07,
            SerialCommand::GetVersion => 0x08,
            SerialCommand::LineMode => 0x0A,
            SerialCommand::TarEmf => 0x0B,
            SerialCommand::UtEmf => 0x0C,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(SerialCommand::StartMeasurement),
            0x02 => Some(SerialCommand::StopMeasurement),
            0x03 => Some(SerialCommand::SetFrequency),
            0x04 => Some(SerialCommand::SetGain),
            0x05 => Some(SerialCommand::Calibrate),
            0x06 => Some(SerialCommand::GetStatus),
            0x07 => Some(SerialCommand::Autobalance),
            0x08 => Some(SerialCommand::GetVersion),
            0x0A => Some(SerialCommand::LineMode),
            0x0B => Some(SerialCommand::TarEmf),
            0x0C => Some(SerialCommand::UtEmf),
            _ => None,
        }
    }

    fn kind(self) -> CommandKind {
        match self {
            SerialCommand::StartMeasurement => CommandKind::StartMeasurement,
            SerialCommand::StopMeasurement => CommandKind::StopMeasurement,
            SerialCommand::SetFrequency => CommandKind::SetFrequency,
            SerialCommand::SetGain => CommandKind::SetGain,
            SerialCommand::Calibrate => CommandKind::Calibrate,
            SerialCommand::GetStatus => CommandKind::GetStatus,
            SerialCommand::Autobalance => CommandKind::Autobalance,
            SerialCommand::GetVersion => CommandKind::GetVersion,
            SerialCommand::LineMode => CommandKind::LineMode,
            SerialCommand::TarEmf => CommandKind::TarEmf,
            SerialCommand::UtEmf => CommandKind::UtEmf,
        }
    }

    fn from_kind(kind: CommandKind) -> Option<Self> {
        Some(match kind {
            CommandKind::StartMeasurement => SerialCommand::StartMeasurement,
            CommandKind::StopMeasurement => SerialCommand::StopMeasurement,
            CommandKind::SetFrequency => SerialCommand::SetFrequency,
            CommandKind::SetGain => SerialCommand::SetGain,
            CommandKind::Calibrate => SerialCommand::Calibrate,
            CommandKind::GetStatus => SerialCommand::GetStatus,
            CommandKind::Autobalance => SerialCommand::Autobalance,
            CommandKind::GetVersion => SerialCommand::GetVersion,
            CommandKind::LineMode => SerialCommand::LineMode,
            CommandKind::TarEmf => SerialCommand::TarEmf,
            CommandKind::UtEmf => SerialCommand::UtEmf,
        })
    }
}

/// Command table of the Bluetooth LE link
///
/// SET_GAIN and GET_STATUS have no code here: their serial codes are taken
/// by SET_FREQUENCY and CALIBRATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BleCommand {
    StartMeasurement,
    StopMeasurement,
    SetFrequency,
    Calibrate,
    Autobalance,
    GetVersion,
    LineMode,
    TarEmf,
    UtEmf,
}

impl WireCommand for BleCommand {
    const VARIANT: ProtocolVariant = ProtocolVariant::Ble;
    const FREQUENCY_ORDER: ByteOrder = ByteOrder::Big;
    const CALIBRATE_HAS_FLAG: bool = true;

    fn code(self) -> u8 {
        match self {
            BleCommand::StartMeasurement => 0x01,
            BleCommand::StopMeasurement => 0x02,
            BleCommand::SetFrequency => 0x04,
            BleCommand::Calibrate => 0x06,
            BleCommand::Autobalance => 0x07,
            BleCommand::GetVersion => 0x08,
            BleCommand::LineMode => 0x0A,
            BleCommand::TarEmf => 0x0B,
            BleCommand::UtEmf => 0x0C,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(BleCommand::StartMeasurement),
            0x02 => Some(BleCommand::StopMeasurement),
            0x04 => Some(BleCommand::SetFrequency),
            0x06 => Some(BleCommand::Calibrate),
            0x07 => Some(BleCommand::Autobalance),
            0x08 => Some(BleCommand::GetVersion),
            0x0A => Some(BleCommand::LineMode),
            0x0B => Some(BleCommand::TarEmf),
            0x0C => Some(BleCommand::UtEmf),
            _ => None,
        }
    }

    fn kind(self) -> CommandKind {
        match self {
            BleCommand::StartMeasurement => CommandKind::StartMeasurement,
            BleCommand::StopMeasurement => CommandKind::StopMeasurement,
            BleCommand::SetFrequency => CommandKind::SetFrequency,
            BleCommand::Calibrate => CommandKind::Calibrate,
            BleCommand::Autobalance => CommandKind::Autobalance,
            BleCommand::GetVersion => CommandKind::GetVersion,
            BleCommand::LineMode => CommandKind::LineMode,
            BleCommand::TarEmf => CommandKind::TarEmf,
            BleCommand::UtEmf => CommandKind::UtEmf,
        }
    }

    fn from_kind(kind: CommandKind) -> Option<Self> {
        match kind {
            CommandKind::StartMeasurement => Some(BleCommand::StartMeasurement),
            CommandKind::StopMeasurement => Some(BleCommand::StopMeasurement),
            CommandKind::SetFrequency => Some(BleCommand::SetFrequency),
            CommandKind::Calibrate => Some(BleCommand::Calibrate),
            CommandKind::Autobalance => Some(BleCommand::Autobalance),
            CommandKind::GetVersion => Some(BleCommand::GetVersion),
            CommandKind::LineMode => Some(BleCommand::LineMode),
            CommandKind::TarEmf => Some(BleCommand::TarEmf),
            CommandKind::UtEmf => Some(BleCommand::UtEmf),
            CommandKind::SetGain | CommandKind::GetStatus => None,
        }
    }
}
