// Autobalance module - three-phase compass/tilt offset calibration
//
// Components:
// - phase: AutobalancePhase and per-phase PhaseState
// - point: sensor samples and collected calibration points
// - state: persisted AutobalanceState and sample correction
// - store: persistence seam (JSON file, in-memory)
// - machine: synchronous single-writer state machine
// - controller: mutex-guarded machine with tokio timeouts and progress events

pub mod controller;
pub mod machine;
pub mod phase;
pub mod point;
pub mod state;
pub mod store;

pub use controller::{AutobalanceController, AutobalanceEvent};
pub use machine::{
    AutobalanceMachine, AutobalanceParams, PhaseOutcome, StartOutcome, DEFAULT_PHASE_TIMEOUT,
    MIN_CALIBRATION_POINTS,
};
pub use phase::{AutobalancePhase, PhaseState};
pub use point::{CalibrationPoint, SensorSample};
pub use state::AutobalanceState;
pub use store::{AutobalanceStore, JsonFileStore, MemoryStore};
