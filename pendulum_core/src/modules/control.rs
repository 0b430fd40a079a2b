use crate::modules::client::ProtocolClient;
use crate::modules::params::{EditField, ParameterDefinition, ParameterError};
use crate::modules::persistence::{self, PersistenceError};
use crate::modules::session::{SessionController, SessionError, StartOutcome, StopOutcome};
use crate::modules::status::{emit, RunState, StatusEvent, StatusSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Operator actions, applied one at a time by [`ControlActor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlIntent {
    Add(ParameterDefinition),
    Remove(String),
    Edit { name: String, field: EditField },
    Start,
    Stop,
    Load(PathBuf),
    Save(PathBuf),
    List,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("stop the plugin before loading new settings")]
    Busy,
}

pub struct ControlActor<C: ProtocolClient> {
    controller: SessionController<C>,
    status: Arc<dyn StatusSink>,
}

impl<C: ProtocolClient> ControlActor<C> {
    pub fn new(controller: SessionController<C>, status: Arc<dyn StatusSink>) -> Self {
        Self { controller, status }
    }

    pub fn controller(&self) -> &SessionController<C> {
        &self.controller
    }

    /// Applies intents until every sender is dropped, then shuts the session
    /// down so the transport is released before returning.
    pub async fn run(self, mut rx: mpsc::Receiver<ControlIntent>) {
        while let Some(intent) = rx.recv().await {
            match self.apply(intent) {
                Ok(()) => {}
                // The controller already reported this one.
                Err(ControlError::Session(SessionError::NoParameters)) => {}
                Err(e) => self.report_error(format!("Error: {e}")),
            }
        }
        self.controller.shutdown().await;
    }

    pub fn apply(&self, intent: ControlIntent) -> Result<(), ControlError> {
        let params = self.controller.params();
        match intent {
            ControlIntent::Add(def) => {
                let name = def.name.clone();
                params.add(def)?;
                self.report(format!("Added {name}"));
            }
            ControlIntent::Remove(name) => match params.remove(&name) {
                Some(_) => self.report(format!("Removed {name}")),
                None => self.report(format!("No parameter named {name}")),
            },
            ControlIntent::Edit { name, field } => {
                let def = params.edit(&name, field)?;
                self.report(format!(
                    "Updated {}: min {} max {} freq {} Hz",
                    def.name, def.min_value, def.max_value, def.frequency_hz
                ));
            }
            ControlIntent::Start => {
                if let StartOutcome::AlreadyActive(state) = self.controller.start()? {
                    self.report(format!("Already {state}"));
                }
            }
            ControlIntent::Stop => {
                if let StopOutcome::NotRunning(state) = self.controller.stop() {
                    self.report(format!("Already {state}"));
                }
            }
            ControlIntent::Load(path) => {
                if self.controller.state() != RunState::Stopped {
                    return Err(ControlError::Busy);
                }
                let n = persistence::load_settings(&path, params)?;
                self.report(format!("Loaded {n} parameter(s) from {}", file_label(&path)));
            }
            ControlIntent::Save(path) => {
                persistence::save_settings(&path, params)?;
                self.report(format!("Saved to {}", file_label(&path)));
            }
            ControlIntent::List => {
                let snapshot = params.snapshot();
                if snapshot.is_empty() {
                    self.report("No parameters defined");
                }
                for def in snapshot {
                    self.report(format!(
                        "{}: min {} max {} freq {} Hz",
                        def.name, def.min_value, def.max_value, def.frequency_hz
                    ));
                }
            }
        }
        Ok(())
    }

    fn report(&self, message: impl Into<String>) {
        emit(
            self.status.as_ref(),
            StatusEvent::info(self.controller.state(), message),
        );
    }

    fn report_error(&self, message: impl Into<String>) {
        emit(
            self.status.as_ref(),
            StatusEvent::error(self.controller.state(), message),
        );
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
