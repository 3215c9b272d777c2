// Autobalance phases and their per-phase state

use serde::{Deserialize, Serialize};

/// One autobalance sub-procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutobalancePhase {
    Compass,
    Horizontal,
    Vertical,
}

impl AutobalancePhase {
    pub const ALL: [AutobalancePhase; 3] = [
        AutobalancePhase::Compass,
        AutobalancePhase::Horizontal,
        AutobalancePhase::Vertical,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AutobalancePhase::Compass => "COMPASS",
            AutobalancePhase::Horizontal => "HORIZONTAL",
            AutobalancePhase::Vertical => "VERTICAL",
        }
    }

    /// State a phase enters when started
    pub fn collecting_state(&self) -> PhaseState {
        match self {
            AutobalancePhase::Compass => PhaseState::Started,
            AutobalancePhase::Horizontal => PhaseState::CollectingHorizontal,
            AutobalancePhase::Vertical => PhaseState::CollectingVertical,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            AutobalancePhase::Compass => 0,
            AutobalancePhase::Horizontal => 1,
            AutobalancePhase::Vertical => 2,
        }
    }
}

/// Lifecycle of one phase
///
/// `NotStarted -> Started | Collecting* -> Finished -> Saved`. An
/// under-sampled or stopped phase returns to `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    #[default]
    NotStarted,
    Started,
    CollectingHorizontal,
    CollectingVertical,
    Finished,
    Saved,
}

impl PhaseState {
    /// Points are being accumulated
    pub fn is_collecting(&self) -> bool {
        matches!(
            self,
            PhaseState::Started | PhaseState::CollectingHorizontal | PhaseState::CollectingVertical
        )
    }

    /// Offsets/scales of the phase hold a computed result
    pub fn has_result(&self) -> bool {
        matches!(self, PhaseState::Finished | PhaseState::Saved)
    }
}
