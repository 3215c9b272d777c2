// AutobalanceMachine - synchronous single-writer core of the autobalance procedure
//
// All phase transitions, sample ingestion and timeout handling go through
// one `&mut self`, so wrapping the machine in a single mutex (see
// AutobalanceController) is enough to serialize them.
//
// Each start hands out a fresh generation number. A timeout carries the
// generation it was armed for and is ignored unless that exact run of the
// phase is still collecting.

use std::time::Duration;

use crate::config::AutobalanceConfig;
use crate::error::{AutobalanceError, ErrorCode};

use super::phase::{AutobalancePhase, PhaseState};
use super::point::{mean_xyz, CalibrationPoint, SensorSample};
use super::state::AutobalanceState;

/// Minimum points for a phase to produce a result
pub const MIN_CALIBRATION_POINTS: usize = 20;

/// Default collection timeout per phase
pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(60);

/// Collection limits of one phase run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutobalanceParams {
    pub min_points: usize,
    pub auto_finish_points: usize,
    pub timeout: Duration,
}

impl Default for AutobalanceParams {
    fn default() -> Self {
        Self {
            min_points: MIN_CALIBRATION_POINTS,
            auto_finish_points: MIN_CALIBRATION_POINTS * 2,
            timeout: DEFAULT_PHASE_TIMEOUT,
        }
    }
}

impl From<&AutobalanceConfig> for AutobalanceParams {
    fn from(config: &AutobalanceConfig) -> Self {
        Self {
            min_points: config.min_points,
            auto_finish_points: config.auto_finish_points().max(config.min_points),
            timeout: config.timeout(),
        }
    }
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Phase is now collecting; arm a timeout for this generation
    Started { generation: u64 },
    /// Phase was not `NotStarted`; nothing changed
    Ignored { state: PhaseState },
}

/// How a collecting phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Finished {
        phase: AutobalancePhase,
        collected: usize,
    },
    /// Too few points; phase back to `NotStarted`, points discarded
    Abandoned {
        phase: AutobalancePhase,
        collected: usize,
        required: usize,
    },
}

impl PhaseOutcome {
    pub fn phase(&self) -> AutobalancePhase {
        match self {
            PhaseOutcome::Finished { phase, .. } | PhaseOutcome::Abandoned { phase, .. } => *phase,
        }
    }

    /// Diagnostic error for an abandoned phase
    pub fn as_error(&self) -> Option<AutobalanceError> {
        match *self {
            PhaseOutcome::Finished { .. } => None,
            PhaseOutcome::Abandoned {
                phase,
                collected,
                required,
            } => Some(AutobalanceError::InsufficientCalibrationSamples {
                phase,
                required,
                collected,
            }),
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    generation: u64,
    points: Vec<CalibrationPoint>,
}

/// Owned autobalance state plus in-flight collection
#[derive(Debug)]
pub struct AutobalanceMachine {
    state: AutobalanceState,
    runs: [Option<ActiveRun>; 3],
    params: AutobalanceParams,
    next_generation: u64,
}

impl AutobalanceMachine {
    pub fn new(params: AutobalanceParams) -> Self {
        Self {
            state: AutobalanceState::default(),
            runs: [None, None, None],
            params,
            next_generation: 1,
        }
    }

    pub fn params(&self) -> &AutobalanceParams {
        &self.params
    }

    pub fn state(&self) -> &AutobalanceState {
        &self.state
    }

    pub fn phase_state(&self, phase: AutobalancePhase) -> PhaseState {
        self.state.phase_state(phase)
    }

    /// Points collected so far by a running phase
    pub fn collected(&self, phase: AutobalancePhase) -> usize {
        self.runs[phase.index()]
            .as_ref()
            .map_or(0, |run| run.points.len())
    }

    /// Phases with a collection in flight
    pub fn active_phases(&self) -> Vec<AutobalancePhase> {
        AutobalancePhase::ALL
            .into_iter()
            .filter(|phase| self.runs[phase.index()].is_some())
            .collect()
    }

    /// Generation of the running phase, if any
    pub fn generation(&self, phase: AutobalancePhase) -> Option<u64> {
        self.runs[phase.index()].as_ref().map(|run| run.generation)
    }

    /// Start collecting for a phase
    ///
    /// Only a `NotStarted` phase can start. Anything else is ignored and
    /// reported as `StartOutcome::Ignored`.
    pub fn start(&mut self, phase: AutobalancePhase) -> StartOutcome {
        let current = self.state.phase_state(phase);
        if current != PhaseState::NotStarted {
            tracing::debug!(
                phase = phase.display_name(),
                state = ?current,
                "ignoring start of autobalance phase that is not NotStarted"
            );
            return StartOutcome::Ignored { state: current };
        }

        let others = self.active_phases();
        if !others.is_empty() {
            tracing::warn!(
                phase = phase.display_name(),
                active = ?others,
                "starting autobalance phase while another phase is collecting"
            );
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.runs[phase.index()] = Some(ActiveRun {
            generation,
            points: Vec::with_capacity(self.params.auto_finish_points),
        });
        self.state.set_phase_state(phase, phase.collecting_state());

        tracing::info!(phase = phase.display_name(), generation, "autobalance phase started");
        StartOutcome::Started { generation }
    }

    /// Append one sensor sample to every collecting phase
    ///
    /// Returns the outcomes of phases that reached the auto-finish count.
    /// Samples with a NaN or infinite axis are skipped.
    pub fn ingest(&mut self, sample: &SensorSample) -> Vec<PhaseOutcome> {
        let mut outcomes = Vec::new();

        if !sample.is_finite() {
            tracing::warn!(
                x = sample.x,
                y = sample.y,
                z = sample.z,
                "skipping non-finite autobalance sample"
            );
            return outcomes;
        }

        for phase in AutobalancePhase::ALL {
            let reached_target = match self.runs[phase.index()].as_mut() {
                Some(run) => {
                    run.points.push(CalibrationPoint::from_sample(sample, phase));
                    run.points.len() >= self.params.auto_finish_points
                }
                None => false,
            };

            if reached_target {
                if let Some(outcome) = self.complete(phase) {
                    outcomes.push(outcome);
                }
            }
        }

        outcomes
    }

    /// Timeout fired for a given run of a phase
    ///
    /// Stale timeouts (phase stopped, finished or restarted since) return
    /// `None` and change nothing.
    pub fn on_timeout(&mut self, phase: AutobalancePhase, generation: u64) -> Option<PhaseOutcome> {
        if self.generation(phase) != Some(generation) {
            tracing::debug!(
                phase = phase.display_name(),
                generation,
                "ignoring stale autobalance timeout"
            );
            return None;
        }
        self.complete(phase)
    }

    /// Finish a collecting phase immediately
    pub fn finish(&mut self, phase: AutobalancePhase) -> Result<PhaseOutcome, AutobalanceError> {
        self.complete(phase)
            .ok_or(AutobalanceError::NotActive { phase })
    }

    /// `Finished` phases become `Saved`; returns the phases that moved
    pub fn mark_saved(&mut self) -> Vec<AutobalancePhase> {
        let mut saved = Vec::new();
        for phase in AutobalancePhase::ALL {
            if self.state.phase_state(phase) == PhaseState::Finished {
                self.state.set_phase_state(phase, PhaseState::Saved);
                saved.push(phase);
            }
        }
        saved
    }

    /// Cancel every in-flight phase, discarding its points
    pub fn stop(&mut self) -> Vec<AutobalancePhase> {
        let cancelled = self.active_phases();
        for phase in &cancelled {
            self.runs[phase.index()] = None;
            self.state.set_phase_state(*phase, PhaseState::NotStarted);
        }
        if !cancelled.is_empty() {
            tracing::info!(phases = ?cancelled, "autobalance collection stopped");
        }
        cancelled
    }

    /// Reset everything to defaults
    pub fn delete_all(&mut self) {
        self.runs = [None, None, None];
        self.state = AutobalanceState::default();
        tracing::info!("autobalance state reset to defaults");
    }

    /// Put one finished or saved phase back to `NotStarted` so it can be redone
    ///
    /// Its previous result stays in effect until the new run finishes.
    pub fn reset_phase(&mut self, phase: AutobalancePhase) -> Result<(), AutobalanceError> {
        let from = self.state.phase_state(phase);
        if from.is_collecting() {
            return Err(AutobalanceError::InvalidTransition { phase, from });
        }
        self.state.set_phase_state(phase, PhaseState::NotStarted);
        Ok(())
    }

    /// Replace the whole state, e.g. after loading it from a store
    ///
    /// # Errors
    /// `CalibrationAlreadyActive` while any phase is collecting.
    pub fn load_state(&mut self, mut state: AutobalanceState) -> Result<(), AutobalanceError> {
        if let Some(phase) = self.active_phases().first().copied() {
            return Err(AutobalanceError::CalibrationAlreadyActive { phase });
        }
        state.normalize_loaded();
        self.state = state;
        Ok(())
    }

    /// End a run, reducing its points when there are enough of them
    fn complete(&mut self, phase: AutobalancePhase) -> Option<PhaseOutcome> {
        let run = self.runs[phase.index()].take()?;
        let collected = run.points.len();

        if collected < self.params.min_points {
            self.state.set_phase_state(phase, PhaseState::NotStarted);
            let outcome = PhaseOutcome::Abandoned {
                phase,
                collected,
                required: self.params.min_points,
            };
            if let Some(err) = outcome.as_error() {
                tracing::warn!(code = err.code(), "{}", err.message());
            }
            return Some(outcome);
        }

        self.apply_result(phase, run.points);
        self.state.set_phase_state(phase, PhaseState::Finished);

        tracing::info!(phase = phase.display_name(), collected, "autobalance phase finished");
        Some(PhaseOutcome::Finished { phase, collected })
    }

    fn apply_result(&mut self, phase: AutobalancePhase, points: Vec<CalibrationPoint>) {
        self.state.last_calibration_timestamp = points.iter().map(|p| p.timestamp_ms).max();

        match phase {
            AutobalancePhase::Horizontal => {
                if let Some((mean_x, mean_y, _)) = mean_xyz(&points) {
                    self.state.horizontal_offset_x = -mean_x;
                    self.state.horizontal_offset_y = -mean_y;
                    self.state.horizontal_scale_x = 1.0;
                    self.state.horizontal_scale_y = 1.0;
                }
            }
            AutobalancePhase::Vertical => {
                if let Some((_, _, mean_z)) = mean_xyz(&points) {
                    self.state.vertical_offset_z = -mean_z;
                    self.state.vertical_scale_z = 1.0;
                }
            }
            AutobalancePhase::Compass => {
                // no declination model yet; keep the raw points
                self.state.compass_declination = 0.0;
                self.state.compass_points = points;
            }
        }
    }
}

impl Default for AutobalanceMachine {
    fn default() -> Self {
        Self::new(AutobalanceParams::default())
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
