// EMF Probe Core - protocol, calibration and autobalance for a handheld EMF probe
//
// Layers, leaf first:
// protocol -> measurement -> autobalance -> session

// Module declarations
pub mod autobalance;
pub mod config;
pub mod error;
pub mod measurement;
pub mod protocol;
pub mod session;

// Re-exports for convenience
pub use autobalance::{
    AutobalanceController, AutobalanceEvent, AutobalancePhase, AutobalanceState, PhaseState,
    SensorSample,
};
pub use config::AppConfig;
pub use error::{AutobalanceError, ErrorCode, MeasurementError, ProtocolError, SessionError};
pub use measurement::{MaterialType, MeasurementEngine, Reading};
pub use protocol::{DeviceCommand, DeviceResponse, ProtocolVariant};
pub use session::{DeviceSession, SessionEvent, SessionState, Transport};
