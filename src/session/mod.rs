// Session module - thin orchestrator for one measurement session
//
// Sequence: initialize -> set frequency/gain -> start -> stream readings ->
// apply autobalance corrections -> stop.
//
// The session owns the outbound transport, the frame assembler and the
// measurement engine. Inbound bytes are pushed in through `on_bytes`;
// corrupt frames are logged and dropped without ending the session, and
// the frames after them are still delivered.

pub mod transport;

use serde::Serialize;

use crate::autobalance::AutobalanceState;
use crate::config::AppConfig;
use crate::error::{
    log_measurement_error, log_protocol_error, log_session_error, MeasurementError,
    ProtocolError, SessionError,
};
use crate::measurement::{FrequencyMode, FrequencyTable, MeasurementEngine, Reading};
use crate::measurement::reading::now_ms;
use crate::protocol::{DeviceCommand, DeviceResponse, FrameAssembler, ProtocolVariant};

pub use transport::{MockTransport, Transport, TransportError};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Initialized,
    Configured,
    Measuring,
    Stopped,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Initialized => "Initialized",
            SessionState::Configured => "Configured",
            SessionState::Measuring => "Measuring",
            SessionState::Stopped => "Stopped",
        }
    }
}

/// Something the session extracted from inbound bytes
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Accepted measurement
    Reading(Reading),
    /// Measurement dropped by the gate or depth policy
    Rejected(MeasurementError),
    /// Any other device response
    Response(DeviceResponse),
}

/// One device session over a transport
pub struct DeviceSession<T: Transport> {
    transport: T,
    variant: ProtocolVariant,
    frequency_mode: FrequencyMode,
    table: FrequencyTable,
    frequency_hz: Option<u32>,
    gain: Option<f64>,
    engine: MeasurementEngine,
    assembler: FrameAssembler,
    state: SessionState,
    firmware_version: Option<String>,
    dropped_frames: u64,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, config: &AppConfig) -> Self {
        Self {
            transport,
            variant: config.protocol.variant,
            frequency_mode: config.protocol.frequency_mode,
            table: FrequencyTable::new(),
            frequency_hz: None,
            gain: None,
            engine: MeasurementEngine::from_config(&config.measurement),
            assembler: FrameAssembler::new(),
            state: SessionState::Idle,
            firmware_version: None,
            dropped_frames: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Carrier frequency last sent to the device
    pub fn frequency_hz(&self) -> Option<u32> {
        self.frequency_hz
    }

    pub fn gain(&self) -> Option<f64> {
        self.gain
    }

    /// Version string reported by the device, once received
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    /// Frames discarded because they failed to decode
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Query the firmware version and enter `Initialized`
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionState::Idle, SessionState::Stopped], "initialize")?;
        self.send(&DeviceCommand::GetVersion)?;
        self.assembler.clear();
        self.state = SessionState::Initialized;
        tracing::info!(variant = %self.variant, "session initialized");
        Ok(())
    }

    /// Select a carrier by table index
    pub fn set_frequency_index(&mut self, index: usize) -> Result<u32, SessionError> {
        self.require_configurable("set frequency")?;

        if self.frequency_mode != FrequencyMode::Table {
            return Err(self.invalid_frequency(format!("index {}", index)));
        }
        let hz = self
            .table
            .get(index)
            .ok_or_else(|| self.invalid_frequency(format!("index {}", index)))?;

        self.send(&DeviceCommand::SetFrequency { hz })?;
        self.table.select(index);
        self.apply_frequency(hz);
        Ok(hz)
    }

    /// Set a carrier by value
    ///
    /// In legacy mode any frequency in 1..=1000 Hz; in table mode only exact
    /// table entries.
    pub fn set_frequency_hz(&mut self, hz: u32) -> Result<(), SessionError> {
        self.require_configurable("set frequency")?;

        if !self.frequency_mode.accepts_hz(hz) {
            return Err(self.invalid_frequency(format!("{} Hz", hz)));
        }

        self.send(&DeviceCommand::SetFrequency { hz })?;
        if let Some(index) = FrequencyTable::index_of(hz) {
            self.table.select(index);
        }
        self.apply_frequency(hz);
        Ok(())
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<(), SessionError> {
        self.require_configurable("set gain")?;

        let scaled = gain * 100.0;
        if !scaled.is_finite() || scaled.round().abs() > i32::MAX as f64 {
            return Err(ProtocolError::MalformedPayload {
                command: "SET_GAIN",
                reason: format!("gain {} does not fit the wire format", gain),
            }
            .into());
        }

        self.send(&DeviceCommand::SetGain { gain })?;
        self.gain = Some(gain);
        Ok(())
    }

    /// Start streaming measurements
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionState::Configured, SessionState::Stopped], "start measurement")?;
        if self.frequency_hz.is_none() {
            return Err(SessionError::InvalidState {
                operation: "start measurement",
                state: "unconfigured",
            });
        }

        self.send(&DeviceCommand::StartMeasurement)?;
        self.state = SessionState::Measuring;
        tracing::info!(frequency_hz = ?self.frequency_hz, "measurement started");
        Ok(())
    }

    /// Enable device-side autobalance when any phase has been saved
    ///
    /// Returns whether the AUTOBALANCE command was sent.
    pub fn apply_autobalance(&mut self, state: &AutobalanceState) -> Result<bool, SessionError> {
        if self.state == SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "apply autobalance",
                state: self.state.name(),
            });
        }
        if !state.any_saved() {
            tracing::debug!("no saved autobalance phase, nothing to apply");
            return Ok(false);
        }

        self.send(&DeviceCommand::Autobalance { enable: true })?;
        tracing::info!(
            horizontal = ?state.horizontal_phase,
            vertical = ?state.vertical_phase,
            compass = ?state.compass_phase,
            "autobalance enabled on device"
        );
        Ok(true)
    }

    /// Stop streaming; safe from any state
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Measuring {
            self.send(&DeviceCommand::StopMeasurement)?;
            tracing::info!(dropped_frames = self.dropped_frames, "measurement stopped");
        }
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Feed received bytes and collect whatever complete frames they finish
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Vec<SessionEvent> {
        self.assembler.push(bytes);

        let mut events = Vec::new();
        while let Some(frame) = self.assembler.next_frame() {
            match frame.and_then(|frame| self.variant.decode_response(&frame)) {
                Ok(response) => events.push(self.handle_response(response)),
                Err(err) => {
                    self.dropped_frames += 1;
                    log_protocol_error(&err, "on_bytes");
                }
            }
        }
        events
    }

    fn handle_response(&mut self, response: DeviceResponse) -> SessionEvent {
        match response {
            DeviceResponse::Measurement(raw) => {
                if self.state != SessionState::Measuring {
                    tracing::debug!(state = self.state.name(), "measurement outside Measuring state");
                }
                match self.engine.process(&raw, now_ms()) {
                    Ok(reading) => SessionEvent::Reading(reading),
                    Err(err) => {
                        log_measurement_error(&err, "on_bytes");
                        SessionEvent::Rejected(err)
                    }
                }
            }
            DeviceResponse::Version { version } => {
                tracing::info!(version = %version, "device firmware version");
                self.firmware_version = Some(version.clone());
                SessionEvent::Response(DeviceResponse::Version { version })
            }
            other => SessionEvent::Response(other),
        }
    }

    // ========================================================================
    // HELPER METHODS - State checks and sending
    // ========================================================================

    fn send(&mut self, command: &DeviceCommand) -> Result<(), SessionError> {
        let frame = self
            .variant
            .encode_command(command)
            .map_err(SessionError::from)
            .inspect_err(|err| log_session_error(err, command.kind().name()))?;

        self.transport
            .send_bytes(&frame)
            .map_err(|err| SessionError::Transport { reason: err.reason })
            .inspect_err(|err| log_session_error(err, command.kind().name()))?;

        tracing::debug!(command = command.kind().name(), len = frame.len(), "frame sent");
        Ok(())
    }

    fn require(&self, allowed: &[SessionState], operation: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn require_configurable(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(
            &[
                SessionState::Initialized,
                SessionState::Configured,
                SessionState::Measuring,
                SessionState::Stopped,
            ],
            operation,
        )
    }

    fn apply_frequency(&mut self, hz: u32) {
        self.frequency_hz = Some(hz);
        if self.state == SessionState::Initialized {
            self.state = SessionState::Configured;
        }
        tracing::info!(frequency_hz = hz, "carrier frequency set");
    }

    fn invalid_frequency(&self, requested: String) -> SessionError {
        SessionError::InvalidFrequency {
            requested,
            allowed: self.frequency_mode.describe_allowed(),
        }
    }
}

#[cfg(test)]
mod tests;
