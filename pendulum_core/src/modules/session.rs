use crate::modules::client::{ProtocolClient, ProtocolError};
use crate::modules::oscillator;
use crate::modules::params::{ParameterDefinition, ParameterSet};
use crate::modules::status::{emit, RunState, StatusEvent, StatusSink};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no valid parameters defined")]
    NoParameters,
    #[error("connection failed: {0}")]
    Connection(#[source] ProtocolError),
    #[error("authentication failed: {0}")]
    Authentication(#[source] ProtocolError),
    #[error("could not register parameter {name}: {source}")]
    Registration {
        name: String,
        #[source]
        source: ProtocolError,
    },
    #[error("sending {name} failed: {source}")]
    Transmission {
        name: String,
        #[source]
        source: ProtocolError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive(RunState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Requested,
    NotRunning(RunState),
}

struct Inner {
    state: RunState,
    cancel: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RunState>,
    status: Arc<dyn StatusSink>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the lock, so observers see transitions in order.
    fn transition(&self, inner: &mut Inner, event: StatusEvent) {
        inner.state = event.state;
        self.state_tx.send_replace(event.state);
        emit(self.status.as_ref(), event);
    }
}

/// Owns the run/stop state machine and at most one run actor.
///
/// `start` and `stop` never wait on the run actor. Both must be called from
/// inside a tokio runtime. Status sinks must not call back into the
/// controller's `start`/`stop`.
pub struct SessionController<C: ProtocolClient> {
    params: ParameterSet,
    factory: Arc<dyn Fn() -> C + Send + Sync>,
    tick_period: Duration,
    shared: Arc<Shared>,
}

impl<C: ProtocolClient> Clone for SessionController<C> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            factory: Arc::clone(&self.factory),
            tick_period: self.tick_period,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: ProtocolClient> SessionController<C> {
    pub fn new(
        params: ParameterSet,
        tick_period: Duration,
        status: Arc<dyn StatusSink>,
        factory: impl Fn() -> C + Send + Sync + 'static,
    ) -> Self {
        let (state_tx, _) = watch::channel(RunState::Stopped);
        Self {
            params,
            factory: Arc::new(factory),
            tick_period,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: RunState::Stopped,
                    cancel: None,
                    task: None,
                }),
                state_tx,
                status,
            }),
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn state(&self) -> RunState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.shared.state_tx.subscribe()
    }

    pub fn start(&self) -> Result<StartOutcome, SessionError> {
        let mut inner = self.shared.lock();
        if inner.state != RunState::Stopped {
            tracing::debug!(state = %inner.state, "start ignored");
            return Ok(StartOutcome::AlreadyActive(inner.state));
        }

        let snapshot = self.params.snapshot();
        if snapshot.is_empty() {
            emit(
                self.shared.status.as_ref(),
                StatusEvent::error(RunState::Stopped, "Error: no valid parameters defined"),
            );
            return Err(SessionError::NoParameters);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.shared.transition(
            &mut inner,
            StatusEvent::info(
                RunState::Starting,
                format!("Connecting ({} parameter(s))...", snapshot.len()),
            ),
        );

        let actor = RunActor {
            client: (self.factory)(),
            params: self.params.clone(),
            snapshot,
            cancel: cancel_rx,
            tick_period: self.tick_period,
            shared: Arc::clone(&self.shared),
        };
        inner.cancel = Some(cancel_tx);
        inner.task = Some(tokio::spawn(actor.run()));
        Ok(StartOutcome::Started)
    }

    pub fn stop(&self) -> StopOutcome {
        let mut inner = self.shared.lock();
        match inner.state {
            RunState::Starting | RunState::Running => {
                self.shared
                    .transition(&mut inner, StatusEvent::info(RunState::Stopping, "Stopping..."));
                if let Some(cancel) = inner.cancel.as_ref() {
                    let _ = cancel.send(true);
                }
                StopOutcome::Requested
            }
            state => StopOutcome::NotRunning(state),
        }
    }

    /// Stops and waits until the run actor has closed its transport.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.shared.lock().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("run actor ended abnormally: {e}");
            }
        }
    }
}

struct RunActor<C> {
    client: C,
    params: ParameterSet,
    snapshot: Vec<ParameterDefinition>,
    cancel: watch::Receiver<bool>,
    tick_period: Duration,
    shared: Arc<Shared>,
}

impl<C: ProtocolClient> RunActor<C> {
    async fn run(self) {
        let RunActor {
            mut client,
            params,
            snapshot,
            mut cancel,
            tick_period,
            shared,
        } = self;

        let result = drive(&mut client, &params, &snapshot, &mut cancel, tick_period, &shared).await;
        client.close().await;

        let mut inner = shared.lock();
        inner.cancel = None;
        let event = match result {
            Ok(()) => StatusEvent::info(RunState::Stopped, "Stopped (Start to resume)"),
            Err(e) => StatusEvent::error(RunState::Stopped, format!("Error: {e}")),
        };
        shared.transition(&mut inner, event);
    }
}

async fn drive<C: ProtocolClient>(
    client: &mut C,
    params: &ParameterSet,
    snapshot: &[ParameterDefinition],
    cancel: &mut watch::Receiver<bool>,
    tick_period: Duration,
    shared: &Shared,
) -> Result<(), SessionError> {
    let mut registered = HashSet::new();

    tokio::select! {
        res = handshake(client, snapshot, &mut registered) => res?,
        _ = cancelled(cancel) => return Ok(()),
    }

    {
        let mut inner = shared.lock();
        if inner.state != RunState::Starting {
            return Ok(());
        }
        shared.transition(
            &mut inner,
            StatusEvent::info(RunState::Running, "Running... (Stop to end)"),
        );
    }

    let started = Instant::now();
    loop {
        if *cancel.borrow() {
            return Ok(());
        }

        let tick_start = Instant::now();
        let elapsed = tick_start.duration_since(started).as_secs_f64();
        // A remote that stops answering must not hold off a stop request.
        tokio::select! {
            res = tick(client, params, &mut registered, elapsed) => res?,
            _ = cancelled(cancel) => return Ok(()),
        }

        // A slow tick only delays the next one.
        let remaining = tick_period.saturating_sub(tick_start.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = cancelled(cancel) => return Ok(()),
        }
    }
}

/// Sends one value per parameter, registering names first seen this tick.
async fn tick<C: ProtocolClient>(
    client: &mut C,
    params: &ParameterSet,
    registered: &mut HashSet<String>,
    elapsed: f64,
) -> Result<(), SessionError> {
    for def in params.snapshot() {
        if !registered.contains(&def.name) {
            register(client, &def.name).await?;
            registered.insert(def.name.clone());
        }
        let value = oscillator::value(elapsed, def.frequency_hz, def.min_value, def.max_value);
        client
            .set_parameter_value(&def.name, value)
            .await
            .map_err(|source| SessionError::Transmission {
                name: def.name.clone(),
                source,
            })?;
    }
    Ok(())
}

async fn handshake<C: ProtocolClient>(
    client: &mut C,
    snapshot: &[ParameterDefinition],
    registered: &mut HashSet<String>,
) -> Result<(), SessionError> {
    client.connect().await.map_err(SessionError::Connection)?;
    client.authenticate().await.map_err(SessionError::Authentication)?;
    for def in snapshot {
        if registered.contains(&def.name) {
            continue;
        }
        register(client, &def.name).await?;
        registered.insert(def.name.clone());
    }
    Ok(())
}

async fn register<C: ProtocolClient>(client: &mut C, name: &str) -> Result<(), SessionError> {
    client
        .register_parameter(name)
        .await
        .map_err(|source| SessionError::Registration {
            name: name.to_string(),
            source,
        })
}

/// Resolves once a stop is requested or the controller side is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}
