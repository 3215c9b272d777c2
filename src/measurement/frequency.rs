// Carrier frequency selection
//
// The physical device supports a fixed 7-entry carrier table. An older
// firmware accepts any integer frequency in 1..=1000 Hz instead; that path
// is only reachable when configured as `FrequencyMode::Legacy`.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Carrier frequencies of the physical device (Hz), index 0..=6
pub const FREQUENCY_TABLE_HZ: [u32; 7] = [19_000, 22_600, 34_000, 45_000, 68_000, 90_400, 135_600];

/// Frequencies accepted by the legacy firmware path (Hz)
pub const LEGACY_FREQUENCY_RANGE: RangeInclusive<u32> = 1..=1000;

/// How the session chooses the carrier frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyMode {
    /// Select by index into [`FREQUENCY_TABLE_HZ`]
    #[default]
    Table,
    /// Free frequency in [`LEGACY_FREQUENCY_RANGE`]
    Legacy,
}

impl FrequencyMode {
    /// Human-readable description of the accepted values
    pub fn describe_allowed(&self) -> String {
        match self {
            FrequencyMode::Table => format!("table index 0..={}", FREQUENCY_TABLE_HZ.len() - 1),
            FrequencyMode::Legacy => format!(
                "{}..={} Hz",
                LEGACY_FREQUENCY_RANGE.start(),
                LEGACY_FREQUENCY_RANGE.end()
            ),
        }
    }

    /// Whether a raw frequency is acceptable in this mode
    pub fn accepts_hz(&self, hz: u32) -> bool {
        match self {
            FrequencyMode::Table => FREQUENCY_TABLE_HZ.contains(&hz),
            FrequencyMode::Legacy => LEGACY_FREQUENCY_RANGE.contains(&hz),
        }
    }
}

/// Selected entry of the carrier table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrequencyTable {
    selected: usize,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        FREQUENCY_TABLE_HZ.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        FREQUENCY_TABLE_HZ.get(index).copied()
    }

    /// Select an entry; out-of-range indices leave the selection unchanged
    pub fn select(&mut self, index: usize) -> Option<u32> {
        let hz = self.get(index)?;
        self.selected = index;
        Some(hz)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_hz(&self) -> u32 {
        FREQUENCY_TABLE_HZ[self.selected]
    }

    /// Table index of an exact frequency
    pub fn index_of(hz: u32) -> Option<usize> {
        FREQUENCY_TABLE_HZ.iter().position(|&entry| entry == hz)
    }
}
