use futures_util::{SinkExt, StreamExt};
use pendulum_core::{
    ParameterDefinition, ParameterSet, PendulumConfig, ProtocolClient, ProtocolError, RunState,
    SessionController, StatusEvent, StatusSink, VtsClient,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const GRANTED_TOKEN: &str = "mock-token-1";

#[derive(Clone, Copy, Default)]
struct MockBehavior {
    deny_access: bool,
}

#[derive(Clone, Default)]
struct MockLog {
    requests: Arc<Mutex<Vec<Value>>>,
    closed_connections: Arc<Mutex<usize>>,
}

impl MockLog {
    fn message_types(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["messageType"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn count(&self, message_type: &str) -> usize {
        self.message_types().iter().filter(|t| *t == message_type).count()
    }

    fn closed(&self) -> usize {
        *self.closed_connections.lock().unwrap()
    }
}

async fn spawn_mock_vts(behavior: MockBehavior) -> (String, MockLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("local addr");
    let log = MockLog::default();
    let log_for_server = log.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = log_for_server.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let text = match msg {
                        Message::Text(text) => text,
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    let req: Value = serde_json::from_str(&text).expect("client sent json");
                    log.requests.lock().unwrap().push(req.clone());
                    let reply = mock_reply(&req, behavior);
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
                *log.closed_connections.lock().unwrap() += 1;
            });
        }
    });

    (format!("ws://{addr}"), log)
}

fn mock_reply(req: &Value, behavior: MockBehavior) -> Value {
    let request_id = req["requestID"].clone();
    let data = &req["data"];
    let (message_type, data) = match req["messageType"].as_str().unwrap_or_default() {
        "AuthenticationTokenRequest" if behavior.deny_access => (
            "APIError",
            json!({ "errorID": 50, "message": "User has denied API access for your plugin." }),
        ),
        "AuthenticationTokenRequest" => (
            "AuthenticationTokenResponse",
            json!({ "authenticationToken": GRANTED_TOKEN }),
        ),
        "AuthenticationRequest" => {
            let ok = data["authenticationToken"] == GRANTED_TOKEN;
            let reason = if ok { "Token valid." } else { "Token invalid." };
            (
                "AuthenticationResponse",
                json!({ "authenticated": ok, "reason": reason }),
            )
        }
        "ParameterCreationRequest" => (
            "ParameterCreationResponse",
            json!({ "parameterName": data["parameterName"] }),
        ),
        "InjectParameterDataRequest" => ("InjectParameterDataResponse", json!({})),
        other => (
            "APIError",
            json!({ "errorID": 1, "message": format!("unsupported {other}") }),
        ),
    };
    json!({
        "apiName": "VTubeStudioPublicAPI",
        "apiVersion": "1.0",
        "timestamp": 1,
        "requestID": request_id,
        "messageType": message_type,
        "data": data,
    })
}

fn config_for(url: &str, token_path: &Path) -> PendulumConfig {
    PendulumConfig {
        ws_url: url.to_string(),
        token_path: token_path.to_path_buf(),
        ..PendulumConfig::default()
    }
}

async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timeout waiting for condition");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn handshake_caches_token_and_injects_values() {
    let (url, log) = spawn_mock_vts(MockBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.txt");

    let mut client = VtsClient::new(&config_for(&url, &token_path));
    client.connect().await.expect("connect");
    client.authenticate().await.expect("authenticate");
    client.register_parameter("Smile").await.expect("register");
    client.register_parameter("Smile").await.expect("register again");
    client.set_parameter_value("Smile", 0.5).await.expect("inject");
    client.close().await;
    client.close().await;
    assert!(!client.is_connected());

    assert_eq!(
        log.message_types(),
        vec![
            "AuthenticationTokenRequest",
            "AuthenticationRequest",
            "ParameterCreationRequest",
            "InjectParameterDataRequest",
        ]
    );
    assert_eq!(std::fs::read_to_string(&token_path).unwrap(), GRANTED_TOKEN);

    let requests = log.requests.lock().unwrap().clone();
    assert_eq!(requests[0]["data"]["pluginName"], "VTS Pendulum");
    assert_eq!(requests[0]["data"]["pluginDeveloper"], "Octorizotto");
    assert_eq!(requests[2]["data"]["parameterName"], "Smile");
    let values = &requests[3]["data"]["parameterValues"];
    assert_eq!(values[0]["id"], "Smile");
    assert_eq!(values[0]["value"], 0.5);

    wait_until(Duration::from_secs(2), || log.closed() == 1).await;
}

#[tokio::test]
async fn cached_token_skips_approval() {
    let (url, log) = spawn_mock_vts(MockBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.txt");
    std::fs::write(&token_path, GRANTED_TOKEN).unwrap();

    let mut client = VtsClient::new(&config_for(&url, &token_path));
    client.connect().await.unwrap();
    client.authenticate().await.unwrap();
    client.close().await;

    assert_eq!(log.message_types(), vec!["AuthenticationRequest"]);
}

#[tokio::test]
async fn stale_cached_token_is_replaced() {
    let (url, log) = spawn_mock_vts(MockBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.txt");
    std::fs::write(&token_path, "revoked-token").unwrap();

    let mut client = VtsClient::new(&config_for(&url, &token_path));
    client.connect().await.unwrap();
    client.authenticate().await.unwrap();
    client.close().await;

    assert_eq!(
        log.message_types(),
        vec![
            "AuthenticationRequest",
            "AuthenticationTokenRequest",
            "AuthenticationRequest",
        ]
    );
    assert_eq!(std::fs::read_to_string(&token_path).unwrap(), GRANTED_TOKEN);
}

#[tokio::test]
async fn denied_access_is_reported_and_nothing_cached() {
    let (url, _log) = spawn_mock_vts(MockBehavior { deny_access: true }).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.txt");

    let mut client = VtsClient::new(&config_for(&url, &token_path));
    client.connect().await.unwrap();
    let err = client.authenticate().await.expect_err("operator denied");
    assert!(matches!(err, ProtocolError::Api { error_id: 50, .. }), "got {err:?}");
    assert!(!token_path.exists());
    client.close().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let mut client = VtsClient::new(&config_for(&format!("ws://{addr}"), &dir.path().join("t")));
    let err = client.connect().await.expect_err("nothing listening");
    assert!(matches!(err, ProtocolError::Connect { .. }), "got {err:?}");
}

#[tokio::test]
async fn requests_before_connect_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = VtsClient::new(&config_for("ws://127.0.0.1:9", &dir.path().join("t")));
    let err = client.set_parameter_value("Smile", 0.1).await.unwrap_err();
    assert!(matches!(err, ProtocolError::NotConnected));
}

#[tokio::test]
async fn controller_streams_to_mock_until_stopped() {
    let (url, log) = spawn_mock_vts(MockBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&url, &dir.path().join("token.txt"));

    let params = ParameterSet::new();
    params.add(ParameterDefinition::new("Smile", 0.0, 1.0, 1.0)).unwrap();

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusEvent>();
    let status: Arc<dyn StatusSink> = Arc::new(status_tx);
    let controller = SessionController::new(params, config.tick_period(), status, move || {
        VtsClient::new(&config)
    });

    controller.start().unwrap();
    let mut state = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == RunState::Running),
    )
    .await
    .expect("reached running")
    .unwrap();

    wait_until(Duration::from_secs(2), || {
        log.count("InjectParameterDataRequest") >= 5
    })
    .await;

    controller.shutdown().await;
    assert_eq!(controller.state(), RunState::Stopped);
    wait_until(Duration::from_secs(2), || log.closed() == 1).await;
    assert_eq!(log.count("ParameterCreationRequest"), 1);

    let mut messages = Vec::new();
    while let Ok(ev) = status_rx.try_recv() {
        assert!(!ev.is_error, "unexpected error status: {}", ev.message);
        messages.push(ev.state);
    }
    assert_eq!(
        messages,
        vec![
            RunState::Starting,
            RunState::Running,
            RunState::Stopping,
            RunState::Stopped,
        ]
    );
}
