use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// One oscillating parameter. Field names on disk follow the settings file
/// layout (`min_val`, `max_val`, `frequency`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "min_val")]
    pub min_value: f64,
    #[serde(rename = "max_val")]
    pub max_value: f64,
    #[serde(rename = "frequency")]
    pub frequency_hz: f64,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, min_value: f64, max_value: f64, frequency_hz: f64) -> Self {
        Self {
            name: name.into(),
            min_value,
            max_value,
            frequency_hz,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.name.trim().is_empty() {
            return Err(ParameterError::InvalidDefinition("name must not be empty".to_string()));
        }
        if !self.min_value.is_finite() || !self.max_value.is_finite() {
            return Err(ParameterError::InvalidDefinition(format!(
                "{}: bounds must be finite",
                self.name
            )));
        }
        if self.max_value < self.min_value {
            return Err(ParameterError::InvalidDefinition(format!(
                "{}: max {} is below min {}",
                self.name, self.max_value, self.min_value
            )));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(ParameterError::InvalidDefinition(format!(
                "{}: frequency must be a positive number of Hz",
                self.name
            )));
        }
        Ok(())
    }
}

impl Default for ParameterDefinition {
    fn default() -> Self {
        Self::new("", 0.0, 1.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditField {
    Name(String),
    Min(f64),
    Max(f64),
    Frequency(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("invalid parameter definition: {0}")]
    InvalidDefinition(String),
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
}

/// Shared, ordered parameter list. Clones share the same storage.
///
/// Duplicate names are stored as given; `remove`/`update` act on the first
/// match.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    inner: Arc<RwLock<Vec<ParameterDefinition>>>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(defs: Vec<ParameterDefinition>) -> Result<Self, ParameterError> {
        let set = Self::new();
        set.replace(defs)?;
        Ok(set)
    }

    pub fn add(&self, def: ParameterDefinition) -> Result<(), ParameterError> {
        def.validate()?;
        self.write().push(def);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<ParameterDefinition> {
        let mut guard = self.write();
        let idx = guard.iter().position(|d| d.name == name)?;
        Some(guard.remove(idx))
    }

    pub fn update(&self, name: &str, new_def: ParameterDefinition) -> Result<(), ParameterError> {
        new_def.validate()?;
        let mut guard = self.write();
        let slot = guard
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))?;
        *slot = new_def;
        Ok(())
    }

    /// Changes one field of the named definition; the result must still
    /// validate.
    pub fn edit(&self, name: &str, field: EditField) -> Result<ParameterDefinition, ParameterError> {
        let mut def = self
            .get(name)
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))?;
        match field {
            EditField::Name(n) => def.name = n,
            EditField::Min(v) => def.min_value = v,
            EditField::Max(v) => def.max_value = v,
            EditField::Frequency(v) => def.frequency_hz = v,
        }
        self.update(name, def.clone())?;
        Ok(def)
    }

    /// Swaps the whole list. Nothing changes if any definition is invalid.
    pub fn replace(&self, defs: Vec<ParameterDefinition>) -> Result<(), ParameterError> {
        for def in &defs {
            def.validate()?;
        }
        *self.write() = defs;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ParameterDefinition> {
        self.read().iter().find(|d| d.name == name).cloned()
    }

    pub fn snapshot(&self) -> Vec<ParameterDefinition> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ParameterDefinition>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ParameterDefinition>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
