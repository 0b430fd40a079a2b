use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Stopped => "stopped",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Human-readable status line for whatever is driving the plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub state: RunState,
    pub message: String,
    pub is_error: bool,
}

impl StatusEvent {
    pub fn info(state: RunState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(state: RunState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            is_error: true,
        }
    }
}

pub trait StatusSink: Send + Sync + 'static {
    fn publish(&self, event: StatusEvent);
}

impl StatusSink for mpsc::UnboundedSender<StatusEvent> {
    fn publish(&self, event: StatusEvent) {
        let _ = self.send(event);
    }
}

/// Logs every event and forwards it to the sink.
pub(crate) fn emit(sink: &dyn StatusSink, event: StatusEvent) {
    if event.is_error {
        tracing::warn!(state = %event.state, "{}", event.message);
    } else {
        tracing::info!(state = %event.state, "{}", event.message);
    }
    sink.publish(event);
}
