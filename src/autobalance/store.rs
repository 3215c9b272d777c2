// Durable storage for AutobalanceState
//
// The store is an external collaborator behind a trait. JsonFileStore keeps
// one JSON document on disk; MemoryStore backs tests and ephemeral sessions.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AutobalanceError;

use super::state::AutobalanceState;

/// Persistence seam for the autobalance document
pub trait AutobalanceStore: Send + Sync {
    /// Load the stored state, `None` if nothing was stored yet
    fn load(&self) -> Result<Option<AutobalanceState>, AutobalanceError>;

    /// Replace the stored state
    fn save(&self, state: &AutobalanceState) -> Result<(), AutobalanceError>;

    /// Remove the stored state
    fn clear(&self) -> Result<(), AutobalanceError>;
}

/// JSON document on the local filesystem
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl AutobalanceStore for JsonFileStore {
    /// A document that cannot be parsed yields default state and a warning
    fn load(&self) -> Result<Option<AutobalanceState>, AutobalanceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<AutobalanceState>(&contents) {
            Ok(mut state) => {
                state.normalize_loaded();
                log::info!("[Autobalance] Loaded state from {:?}", self.path);
                Ok(Some(state))
            }
            Err(err) => {
                log::warn!(
                    "[Autobalance] Failed to parse {:?}: {}. Using defaults.",
                    self.path,
                    err
                );
                Ok(Some(AutobalanceState::default()))
            }
        }
    }

    /// Write to a sibling temp file, then rename over the document
    fn save(&self, state: &AutobalanceState) -> Result<(), AutobalanceError> {
        let json = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        log::info!("[Autobalance] Saved state to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), AutobalanceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<AutobalanceState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AutobalanceState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<AutobalanceState>>, AutobalanceError> {
        self.state.lock().map_err(|_| AutobalanceError::StatePoisoned)
    }
}

impl AutobalanceStore for MemoryStore {
    fn load(&self) -> Result<Option<AutobalanceState>, AutobalanceError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, state: &AutobalanceState) -> Result<(), AutobalanceError> {
        *self.lock()? = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AutobalanceError> {
        *self.lock()? = None;
        Ok(())
    }
}
