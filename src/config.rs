//! Configuration management
//!
//! Runtime configuration is loaded from a JSON file so that the transport
//! variant, frequency mode, depth policy and autobalance parameters can be
//! changed per device without recompiling. Every section falls back to its
//! defaults when omitted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::measurement::{FrequencyMode, MeasurementLimits, NegativeDepthPolicy};
use crate::protocol::ProtocolVariant;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub protocol: ProtocolConfig,
    pub measurement: MeasurementConfig,
    pub autobalance: AutobalanceConfig,
}

/// Wire protocol selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Command table of the attached transport
    pub variant: ProtocolVariant,
    /// Carrier table or legacy 1-1000 Hz firmware path
    pub frequency_mode: FrequencyMode,
}

/// Measurement gate parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub negative_depth: NegativeDepthPolicy,
    pub limits: MeasurementLimits,
}

/// Autobalance procedure parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutobalanceConfig {
    /// Collection timeout per phase (ms)
    pub timeout_ms: u64,
    /// Minimum points for a phase to finish
    pub min_points: usize,
    /// Phase finishes early at `min_points * auto_finish_multiplier`
    pub auto_finish_multiplier: usize,
    /// Persisted autobalance document
    pub storage_path: PathBuf,
}

impl Default for AutobalanceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            min_points: 20,
            auto_finish_multiplier: 2,
            storage_path: PathBuf::from("autobalance.json"),
        }
    }
}

impl AutobalanceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Point count that finishes a phase before its timeout
    pub fn auto_finish_points(&self) -> usize {
        self.min_points.saturating_mul(self.auto_finish_multiplier.max(1))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Never fails: a missing or invalid file logs a warning and yields the
    /// default configuration.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
