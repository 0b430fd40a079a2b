mod modules;

pub use modules::{
    client, config, control, oscillator, params, persistence, session, status, token_store,
};

pub use modules::client::{ProtocolClient, ProtocolError, VtsClient};
pub use modules::config::PendulumConfig;
pub use modules::control::{ControlActor, ControlError, ControlIntent};
pub use modules::params::{EditField, ParameterDefinition, ParameterError, ParameterSet};
pub use modules::session::{SessionController, SessionError, StartOutcome, StopOutcome};
pub use modules::status::{RunState, StatusEvent, StatusSink};
pub use vts_protocol as protocol;
