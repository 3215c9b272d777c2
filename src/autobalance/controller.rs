// AutobalanceController: async owner of the autobalance machine
//
// Wraps AutobalanceMachine in Arc<Mutex<_>> so sample ingestion, timeouts
// and operator commands are serialized, arms one cancellable tokio timeout
// per started phase, persists through an AutobalanceStore and publishes
// progress on a broadcast channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::AutobalanceConfig;
use crate::error::{log_autobalance_error, AutobalanceError, ErrorCode};

use super::machine::{AutobalanceMachine, AutobalanceParams, PhaseOutcome, StartOutcome};
use super::phase::{AutobalancePhase, PhaseState};
use super::point::SensorSample;
use super::state::AutobalanceState;
use super::store::AutobalanceStore;

/// Progress events are sent once per sample per collecting phase
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Progress notifications for UI or logging consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AutobalanceEvent {
    Started {
        phase: AutobalancePhase,
    },
    Progress {
        phase: AutobalancePhase,
        collected: usize,
        target: usize,
    },
    Finished {
        phase: AutobalancePhase,
        collected: usize,
    },
    Abandoned {
        phase: AutobalancePhase,
        collected: usize,
        required: usize,
    },
    Saved {
        phases: Vec<AutobalancePhase>,
    },
    Stopped {
        phases: Vec<AutobalancePhase>,
    },
    Reset,
}

impl From<PhaseOutcome> for AutobalanceEvent {
    fn from(outcome: PhaseOutcome) -> Self {
        match outcome {
            PhaseOutcome::Finished { phase, collected } => {
                AutobalanceEvent::Finished { phase, collected }
            }
            PhaseOutcome::Abandoned {
                phase,
                collected,
                required,
            } => AutobalanceEvent::Abandoned {
                phase,
                collected,
                required,
            },
        }
    }
}

type TimeoutMap = HashMap<AutobalancePhase, JoinHandle<()>>;

/// Serialized, timeout-driven autobalance procedure
///
/// Cloning is cheap and every clone drives the same machine.
///
/// # Runtime
/// `start` spawns the phase timeout with `tokio::spawn` and must be called
/// from within a Tokio runtime.
///
/// # Example
/// ```ignore
/// let controller = AutobalanceController::new(Arc::new(MemoryStore::new()), &config);
/// controller.start(AutobalancePhase::Horizontal)?;
/// for sample in sensor_feed {
///     controller.ingest(&sample)?;
/// }
/// controller.save()?;
/// ```
#[derive(Clone)]
pub struct AutobalanceController {
    machine: Arc<Mutex<AutobalanceMachine>>,
    timeouts: Arc<Mutex<TimeoutMap>>,
    store: Arc<dyn AutobalanceStore>,
    events: broadcast::Sender<AutobalanceEvent>,
    timeout: Duration,
}

impl AutobalanceController {
    pub fn new(store: Arc<dyn AutobalanceStore>, config: &AutobalanceConfig) -> Self {
        Self::with_params(store, AutobalanceParams::from(config))
    }

    pub fn with_params(store: Arc<dyn AutobalanceStore>, params: AutobalanceParams) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            timeout: params.timeout,
            machine: Arc::new(Mutex::new(AutobalanceMachine::new(params))),
            timeouts: Arc::new(Mutex::new(HashMap::new())),
            store,
            events,
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<AutobalanceEvent> {
        self.events.subscribe()
    }

    /// Load the persisted state into the machine
    ///
    /// Returns `true` when a stored document was found.
    ///
    /// # Errors
    /// - `CalibrationAlreadyActive` while a phase is collecting
    /// - `PersistenceFailure` if the store cannot be read
    pub fn restore(&self) -> Result<bool, AutobalanceError> {
        let loaded = self.store.load().inspect_err(|err| {
            log_autobalance_error(err, "restore");
        })?;

        match loaded {
            Some(state) => {
                self.lock_machine()?.load_state(state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Start a phase and arm its timeout
    ///
    /// Starting a phase that is not `NotStarted` is ignored.
    pub fn start(&self, phase: AutobalancePhase) -> Result<StartOutcome, AutobalanceError> {
        let mut machine = self.lock_machine()?;
        let outcome = machine.start(phase);

        if let StartOutcome::Started { generation } = outcome {
            self.arm_timeout(phase, generation)?;
            drop(machine);
            self.emit(AutobalanceEvent::Started { phase });
        }

        Ok(outcome)
    }

    /// Feed one sensor sample to every collecting phase
    pub fn ingest(&self, sample: &SensorSample) -> Result<Vec<PhaseOutcome>, AutobalanceError> {
        let outcomes = {
            let mut machine = self.lock_machine()?;
            let active = machine.active_phases();
            let outcomes = machine.ingest(sample);
            let target = machine.params().auto_finish_points;

            for phase in active {
                let collected = match outcomes.iter().find(|o| o.phase() == phase) {
                    Some(PhaseOutcome::Finished { collected, .. })
                    | Some(PhaseOutcome::Abandoned { collected, .. }) => *collected,
                    None => machine.collected(phase),
                };
                self.emit(AutobalanceEvent::Progress {
                    phase,
                    collected,
                    target,
                });
            }
            for outcome in &outcomes {
                self.cancel_timeout(outcome.phase())?;
            }
            outcomes
        };

        for outcome in &outcomes {
            self.emit((*outcome).into());
        }

        Ok(outcomes)
    }

    /// Finish a collecting phase now instead of waiting for its timeout
    pub fn finish(&self, phase: AutobalancePhase) -> Result<PhaseOutcome, AutobalanceError> {
        let outcome = {
            let mut machine = self.lock_machine()?;
            let outcome = machine.finish(phase).inspect_err(|err| {
                log_autobalance_error(err, "finish");
            })?;
            self.cancel_timeout(phase)?;
            outcome
        };
        self.emit(outcome.into());
        Ok(outcome)
    }

    /// Mark finished phases saved and persist the whole state
    ///
    /// The in-memory transition to `Saved` stands even if the store fails;
    /// calling `save` again retries the write.
    pub fn save(&self) -> Result<Vec<AutobalancePhase>, AutobalanceError> {
        let (phases, snapshot) = {
            let mut machine = self.lock_machine()?;
            let phases = machine.mark_saved();
            (phases, machine.state().clone())
        };

        self.store.save(&snapshot).map_err(|err| {
            let err = match err {
                AutobalanceError::PersistenceFailure { .. } => err,
                other => AutobalanceError::PersistenceFailure {
                    reason: other.message(),
                },
            };
            log_autobalance_error(&err, "save");
            err
        })?;

        tracing::info!(phases = ?phases, "autobalance state saved");
        self.emit(AutobalanceEvent::Saved {
            phases: phases.clone(),
        });
        Ok(phases)
    }

    /// Cancel every in-flight phase and its timeout
    pub fn stop(&self) -> Result<Vec<AutobalancePhase>, AutobalanceError> {
        let phases = {
            let mut machine = self.lock_machine()?;
            self.cancel_all_timeouts()?;
            machine.stop()
        };
        self.emit(AutobalanceEvent::Stopped {
            phases: phases.clone(),
        });
        Ok(phases)
    }

    /// Reset all phases and results and remove the persisted document
    ///
    /// The in-memory reset happens even if clearing the store fails.
    pub fn delete_all(&self) -> Result<(), AutobalanceError> {
        {
            let mut machine = self.lock_machine()?;
            self.cancel_all_timeouts()?;
            machine.delete_all();
        }
        self.emit(AutobalanceEvent::Reset);

        self.store.clear().inspect_err(|err| {
            log_autobalance_error(err, "delete_all");
        })
    }

    /// Allow a finished or saved phase to be run again
    pub fn reset_phase(&self, phase: AutobalancePhase) -> Result<(), AutobalanceError> {
        self.lock_machine()?.reset_phase(phase)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> Result<AutobalanceState, AutobalanceError> {
        Ok(self.lock_machine()?.state().clone())
    }

    pub fn phase_state(&self, phase: AutobalancePhase) -> Result<PhaseState, AutobalanceError> {
        Ok(self.lock_machine()?.phase_state(phase))
    }

    pub fn collected(&self, phase: AutobalancePhase) -> Result<usize, AutobalanceError> {
        Ok(self.lock_machine()?.collected(phase))
    }

    /// Apply the current corrections to a sample
    pub fn correct(&self, sample: &SensorSample) -> Result<SensorSample, AutobalanceError> {
        Ok(self.lock_machine()?.state().correct(sample))
    }

    // ========================================================================
    // HELPER METHODS - Lock management and timeouts
    // ========================================================================

    fn lock_machine(&self) -> Result<MutexGuard<'_, AutobalanceMachine>, AutobalanceError> {
        self.machine
            .lock()
            .map_err(|_| AutobalanceError::StatePoisoned)
    }

    fn lock_timeouts(&self) -> Result<MutexGuard<'_, TimeoutMap>, AutobalanceError> {
        self.timeouts
            .lock()
            .map_err(|_| AutobalanceError::StatePoisoned)
    }

    // Timeout handles are only touched while the machine guard is held, so
    // the map always holds the handle of the run the machine considers live.
    // Lock order: machine, then timeouts. The timeout task locks only the
    // machine.

    /// Spawn the timeout task for one run of a phase
    fn arm_timeout(&self, phase: AutobalancePhase, generation: u64) -> Result<(), AutobalanceError> {
        let machine = Arc::clone(&self.machine);
        let events = self.events.clone();
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let outcome = match machine.lock() {
                Ok(mut guard) => guard.on_timeout(phase, generation),
                Err(_) => {
                    log_autobalance_error(&AutobalanceError::StatePoisoned, "phase_timeout");
                    return;
                }
            };

            if let Some(outcome) = outcome {
                tracing::info!(
                    phase = phase.display_name(),
                    generation,
                    "autobalance phase timed out"
                );
                let _ = events.send(outcome.into());
            }
        });

        if let Some(previous) = self.lock_timeouts()?.insert(phase, handle) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel_timeout(&self, phase: AutobalancePhase) -> Result<(), AutobalanceError> {
        if let Some(handle) = self.lock_timeouts()?.remove(&phase) {
            handle.abort();
        }
        Ok(())
    }

    fn cancel_all_timeouts(&self) -> Result<(), AutobalanceError> {
        for (_, handle) in self.lock_timeouts()?.drain() {
            handle.abort();
        }
        Ok(())
    }

    /// Publish an event; having no subscribers is fine
    fn emit(&self, event: AutobalanceEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
