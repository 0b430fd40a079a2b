use crate::modules::config::PendulumConfig;
use crate::modules::token_store::{TokenStore, TokenStoreError};
use futures_util::{SinkExt, StreamExt};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use vts_protocol::{Request, Response, ResponseEnvelope};
use zeroize::Zeroizing;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("could not reach {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connection closed by the remote application")]
    ConnectionClosed,
    #[error("not connected")]
    NotConnected,
    #[error("api error {error_id}: {message}")]
    Api { error_id: i64, message: String },
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: String },
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

/// Request/response operations the session controller drives. Every call
/// completes before the next one is issued.
pub trait ProtocolClient: Send + 'static {
    fn connect(&mut self) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Token request (cached on disk, may wait for operator approval with no
    /// deadline) followed by the token exchange.
    fn authenticate(&mut self) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Declares a custom parameter. Repeats are not an error.
    fn register_parameter(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    fn set_parameter_value(
        &mut self,
        name: &str,
        value: f64,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Releases the transport. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

enum AuthOutcome {
    Granted,
    Rejected(String),
}

/// VTube Studio public API client over a single websocket.
pub struct VtsClient {
    url: String,
    plugin_name: String,
    plugin_developer: String,
    tokens: TokenStore,
    ws: Option<WsStream>,
    registered: HashSet<String>,
    id_prefix: String,
    next_id: u64,
}

impl VtsClient {
    pub fn new(config: &PendulumConfig) -> Self {
        let id_prefix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self {
            url: config.ws_url.clone(),
            plugin_name: config.plugin_name.clone(),
            plugin_developer: config.plugin_developer.clone(),
            tokens: TokenStore::new(config.token_path.clone()),
            ws: None,
            registered: HashSet::new(),
            id_prefix,
            next_id: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    fn next_request_id(&mut self) -> String {
        self.next_id += 1;
        format!("pendulum-{}-{}", self.id_prefix, self.next_id)
    }

    async fn request(&mut self, request: Request) -> Result<Response, ProtocolError> {
        let request_id = self.next_request_id();
        let ws = self.ws.as_mut().ok_or(ProtocolError::NotConnected)?;

        let payload = serde_json::to_string(&request.envelope(request_id.as_str()))?;
        tracing::debug!(message_type = request.message_type(), %request_id, "vts request");
        ws.send(Message::Text(payload.into())).await?;

        loop {
            let msg = match ws.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ProtocolError::ConnectionClosed),
            };
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => return Err(ProtocolError::ConnectionClosed),
                _ => continue,
            };
            let envelope: ResponseEnvelope = serde_json::from_str(&text)?;
            if !envelope.request_id.is_empty() && envelope.request_id != request_id {
                tracing::debug!(got = %envelope.request_id, "skipping unrelated frame");
                continue;
            }
            return match envelope.decode()? {
                Response::ApiError { error_id, message } => {
                    Err(ProtocolError::Api { error_id, message })
                }
                response => Ok(response),
            };
        }
    }

    async fn request_token(&mut self) -> Result<Zeroizing<String>, ProtocolError> {
        tracing::info!("requesting authentication token, confirm the prompt in VTube Studio");
        let request = Request::AuthenticationToken {
            plugin_name: self.plugin_name.clone(),
            plugin_developer: self.plugin_developer.clone(),
            plugin_icon: None,
        };
        let expected = request.response_type();
        match self.request(request).await? {
            Response::AuthenticationToken {
                authentication_token,
            } => Ok(Zeroizing::new(authentication_token)),
            other => Err(unexpected(expected, &other)),
        }
    }

    async fn exchange_token(&mut self, token: &str) -> Result<AuthOutcome, ProtocolError> {
        let request = Request::Authentication {
            plugin_name: self.plugin_name.clone(),
            plugin_developer: self.plugin_developer.clone(),
            authentication_token: token.to_string(),
        };
        let expected = request.response_type();
        match self.request(request).await? {
            Response::Authentication {
                authenticated: true,
                ..
            } => Ok(AuthOutcome::Granted),
            Response::Authentication { reason, .. } => Ok(AuthOutcome::Rejected(reason)),
            other => Err(unexpected(expected, &other)),
        }
    }
}

impl ProtocolClient for VtsClient {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.ws.is_some() {
            return Ok(());
        }
        let (ws, _resp) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|source| ProtocolError::Connect {
                url: self.url.clone(),
                source,
            })?;
        tracing::info!(url = %self.url, "connected");
        self.ws = Some(ws);
        self.registered.clear();
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), ProtocolError> {
        if let Some(cached) = self.tokens.load()? {
            match self.exchange_token(&cached).await? {
                AuthOutcome::Granted => {
                    tracing::info!("authenticated with cached token");
                    return Ok(());
                }
                AuthOutcome::Rejected(reason) => {
                    tracing::warn!(%reason, "cached token rejected, requesting a new one");
                    self.tokens.clear()?;
                }
            }
        }

        let token = self.request_token().await?;
        match self.exchange_token(&token).await? {
            AuthOutcome::Granted => {
                self.tokens.save(&token)?;
                tracing::info!(path = %self.tokens.path().display(), "authenticated, token cached");
                Ok(())
            }
            AuthOutcome::Rejected(reason) => Err(ProtocolError::Rejected(reason)),
        }
    }

    async fn register_parameter(&mut self, name: &str) -> Result<(), ProtocolError> {
        if self.registered.contains(name) {
            return Ok(());
        }
        let request = Request::ParameterCreation {
            parameter_name: name.to_string(),
            explanation: format!("Oscillated by {}", self.plugin_name),
            min: 0.0,
            max: 1.0,
            default_value: 0.0,
        };
        let expected = request.response_type();
        match self.request(request).await? {
            Response::ParameterCreation { .. } => {
                self.registered.insert(name.to_string());
                Ok(())
            }
            other => Err(unexpected(expected, &other)),
        }
    }

    async fn set_parameter_value(&mut self, name: &str, value: f64) -> Result<(), ProtocolError> {
        let request = Request::set_parameter(name, value);
        let expected = request.response_type();
        match self.request(request).await? {
            Response::InjectParameterData => Ok(()),
            other => Err(unexpected(expected, &other)),
        }
    }

    async fn close(&mut self) {
        self.registered.clear();
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
            tracing::info!("connection closed");
        }
    }
}

fn unexpected(expected: &'static str, got: &Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        expected,
        got: got.message_type().to_string(),
    }
}
