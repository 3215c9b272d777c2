// AutobalanceState - persisted corrections for the compass and tilt axes
//
// Offsets default to 0 and scales to 1 (identity) until the matching phase
// finishes. The document is written as a whole; fields missing from an
// older file are filled with these defaults.

use serde::{Deserialize, Serialize};

use super::phase::{AutobalancePhase, PhaseState};
use super::point::{CalibrationPoint, SensorSample};

/// Complete autobalance result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutobalanceState {
    pub compass_phase: PhaseState,
    pub horizontal_phase: PhaseState,
    pub vertical_phase: PhaseState,
    pub horizontal_offset_x: f64,
    pub horizontal_offset_y: f64,
    pub horizontal_scale_x: f64,
    pub horizontal_scale_y: f64,
    pub vertical_offset_z: f64,
    pub vertical_scale_z: f64,
    /// Compass declination (degrees); not yet reduced from the points
    pub compass_declination: f64,
    /// Milliseconds since the Unix epoch of the last finished phase
    pub last_calibration_timestamp: Option<u64>,
    /// Raw compass points of the last finished compass phase
    #[serde(skip)]
    pub compass_points: Vec<CalibrationPoint>,
}

impl Default for AutobalanceState {
    fn default() -> Self {
        Self {
            compass_phase: PhaseState::NotStarted,
            horizontal_phase: PhaseState::NotStarted,
            vertical_phase: PhaseState::NotStarted,
            horizontal_offset_x: 0.0,
            horizontal_offset_y: 0.0,
            horizontal_scale_x: 1.0,
            horizontal_scale_y: 1.0,
            vertical_offset_z: 0.0,
            vertical_scale_z: 1.0,
            compass_declination: 0.0,
            last_calibration_timestamp: None,
            compass_points: Vec::new(),
        }
    }
}

impl AutobalanceState {
    pub fn phase_state(&self, phase: AutobalancePhase) -> PhaseState {
        match phase {
            AutobalancePhase::Compass => self.compass_phase,
            AutobalancePhase::Horizontal => self.horizontal_phase,
            AutobalancePhase::Vertical => self.vertical_phase,
        }
    }

    pub(crate) fn set_phase_state(&mut self, phase: AutobalancePhase, state: PhaseState) {
        match phase {
            AutobalancePhase::Compass => self.compass_phase = state,
            AutobalancePhase::Horizontal => self.horizontal_phase = state,
            AutobalancePhase::Vertical => self.vertical_phase = state,
        }
    }

    /// First phase currently collecting, if any
    pub fn collecting_phase(&self) -> Option<AutobalancePhase> {
        AutobalancePhase::ALL
            .into_iter()
            .find(|phase| self.phase_state(*phase).is_collecting())
    }

    /// Whether any phase has been saved
    pub fn any_saved(&self) -> bool {
        AutobalancePhase::ALL
            .iter()
            .any(|phase| self.phase_state(*phase) == PhaseState::Saved)
    }

    /// Apply the finished corrections to a raw sensor sample
    ///
    /// `(x + offset_x) * scale_x` and so on. Axes whose phase has no result
    /// pass through unchanged.
    pub fn correct(&self, sample: &SensorSample) -> SensorSample {
        let mut corrected = *sample;

        if self.horizontal_phase.has_result() {
            corrected.x = (sample.x + self.horizontal_offset_x) * self.horizontal_scale_x;
            corrected.y = (sample.y + self.horizontal_offset_y) * self.horizontal_scale_y;
        }
        if self.vertical_phase.has_result() {
            corrected.z = (sample.z + self.vertical_offset_z) * self.vertical_scale_z;
        }

        corrected
    }

    /// Collecting states cannot survive a reload: their points are gone
    pub(crate) fn normalize_loaded(&mut self) {
        for phase in AutobalancePhase::ALL {
            if self.phase_state(phase).is_collecting() {
                self.set_phase_state(phase, PhaseState::NotStarted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_identity() {
        let state = AutobalanceState::default();
        let sample = SensorSample::new(1.5, -2.0, 9.81, 7);
        assert_eq!(state.correct(&sample), sample);
        assert!(!state.any_saved());
        assert_eq!(state.collecting_phase(), None);
    }

    #[test]
    fn test_correct_applies_finished_axes_only() {
        let state = AutobalanceState {
            horizontal_phase: PhaseState::Saved,
            horizontal_offset_x: -1.0,
            horizontal_offset_y: 0.5,
            vertical_phase: PhaseState::NotStarted,
            vertical_offset_z: -100.0,
            ..Default::default()
        };

        let corrected = state.correct(&SensorSample::new(1.0, 1.0, 9.0, 0));
        assert_eq!(corrected.x, 0.0);
        assert_eq!(corrected.y, 1.5);
        assert_eq!(corrected.z, 9.0);
    }

    #[test]
    fn test_document_default_fills() {
        let json = r#"{ "horizontal_phase": "SAVED", "horizontal_offset_x": -0.25 }"#;
        let state: AutobalanceState = serde_json::from_str(json).unwrap();

        assert_eq!(state.horizontal_phase, PhaseState::Saved);
        assert_eq!(state.horizontal_offset_x, -0.25);
        assert_eq!(state.horizontal_scale_x, 1.0);
        assert_eq!(state.vertical_scale_z, 1.0);
        assert_eq!(state.compass_phase, PhaseState::NotStarted);
    }

    #[test]
    fn test_normalize_loaded_drops_collecting_states() {
        let mut state = AutobalanceState {
            compass_phase: PhaseState::Started,
            vertical_phase: PhaseState::Finished,
            ..Default::default()
        };
        state.normalize_loaded();
        assert_eq!(state.compass_phase, PhaseState::NotStarted);
        assert_eq!(state.vertical_phase, PhaseState::Finished);
    }
}
