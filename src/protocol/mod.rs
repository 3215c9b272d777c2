// Protocol module - binary wire codec for the EMF probe
//
// Components:
// 1. command: per-transport command tables (serial, BLE)
// 2. packet: frame encode/decode with 8-bit additive checksum
// 3. payload: fixed byte layouts for command arguments
// 4. message: typed outbound commands (DeviceCommand)
// 5. response: typed inbound responses (DeviceResponse)
// 6. assembler: byte stream to frame splitting
//
// Everything here is pure and free of shared state, so it can be called
// from any thread without locking.

pub mod assembler;
pub mod command;
pub mod message;
pub mod packet;
pub mod payload;
pub mod response;

pub use assembler::FrameAssembler;
pub use command::{BleCommand, CommandKind, ProtocolVariant, SerialCommand, WireCommand};
pub use message::DeviceCommand;
pub use packet::{checksum, decode, encode, Packet, HEADER, MAX_PAYLOAD_LEN};
pub use payload::{LineMode, RawMeasurement, TargetEmf, UnitStatus};
pub use response::DeviceResponse;
