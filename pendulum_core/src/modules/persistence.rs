use crate::modules::params::{ParameterDefinition, ParameterError, ParameterSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no valid parameters to save")]
    Empty,
    #[error("settings file rejected: {0}")]
    Invalid(#[from] ParameterError),
}

/// Writes the set as a JSON array of `{name, min_val, max_val, frequency}`.
pub fn save_settings(path: &Path, set: &ParameterSet) -> Result<usize, PersistenceError> {
    let snapshot = set.snapshot();
    if snapshot.is_empty() {
        return Err(PersistenceError::Empty);
    }
    let payload = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, payload)?;
    Ok(snapshot.len())
}

pub fn read_settings(path: &Path) -> Result<Vec<ParameterDefinition>, PersistenceError> {
    let raw = std::fs::read_to_string(path)?;
    let defs: Vec<ParameterDefinition> = serde_json::from_str(&raw)?;
    Ok(defs)
}

/// Replaces the whole set with the file's contents; the set is untouched on
/// any error.
pub fn load_settings(path: &Path, set: &ParameterSet) -> Result<usize, PersistenceError> {
    let defs = read_settings(path)?;
    let n = defs.len();
    set.replace(defs)?;
    Ok(n)
}
