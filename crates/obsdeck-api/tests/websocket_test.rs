#![allow(clippy::unwrap_used)]
// Integration tests for `ObsClient` against an in-process fake obs-websocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use obsdeck_api::protocol::auth_string;
use obsdeck_api::{
    ConnectTarget, Connector, Error, Link, ObsClient, RemoteEvent, Signal, TransportConfig,
    WebSocketConnector,
};

// ── Fake server ─────────────────────────────────────────────────────

const CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";
const SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";

enum Control {
    Event(Value),
    Close,
}

type Handler = fn(&str, &Value) -> Result<Value, (u16, &'static str)>;

fn default_handler(request_type: &str, data: &Value) -> Result<Value, (u16, &'static str)> {
    match request_type {
        "GetVersion" => Ok(json!({ "obsVersion": "30.1.2", "rpcVersion": 1 })),
        "GetSceneList" => Ok(json!({
            "currentProgramSceneName": "Principal",
            "scenes": [{ "sceneName": "Final", "sceneIndex": 0 }, { "sceneName": "Principal", "sceneIndex": 1 }]
        })),
        "Echo" => Ok(data.clone()),
        "Slow" => Ok(json!({ "slow": true })),
        "SetInputMute" => Err((600, "No source was found by the name of `Nope`.")),
        _ => Ok(Value::Null),
    }
}

/// Accept one client, run the handshake, then answer requests.
///
/// A `Slow` request is held back and answered only after the next request,
/// so the client sees responses out of order. `Never` is never answered.
async fn spawn_fake_obs(
    password: Option<&'static str>,
    handler: Handler,
) -> (u16, mpsc::UnboundedSender<Control>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut hello = json!({ "op": 0, "d": { "obsWebSocketVersion": "5.5.0", "rpcVersion": 1 } });
        if password.is_some() {
            hello["d"]["authentication"] = json!({ "challenge": CHALLENGE, "salt": SALT });
        }
        ws.send(Message::text(hello.to_string())).await.unwrap();

        let identify = next_json(&mut ws).await;
        assert_eq!(identify["op"], 1);
        if let Some(pw) = password {
            let expected = auth_string(pw, CHALLENGE, SALT);
            if identify["d"]["authentication"] != json!(expected) {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::from(4009),
                        reason: "Authentication failed.".into(),
                    }))
                    .await;
                return;
            }
        }
        let identified = json!({ "op": 2, "d": { "negotiatedRpcVersion": 1 } });
        ws.send(Message::text(identified.to_string())).await.unwrap();

        let mut held: Option<Value> = None;
        loop {
            tokio::select! {
                msg = ws.next() => {
                    let Some(Ok(Message::Text(text))) = msg else { break };
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    let d = &frame["d"];
                    let request_type = d["requestType"].as_str().unwrap_or_default();
                    if request_type == "Never" {
                        continue;
                    }
                    let reply = response(request_type, d, handler);
                    if request_type == "Slow" {
                        held = Some(reply);
                        continue;
                    }
                    ws.send(Message::text(reply.to_string())).await.unwrap();
                    if let Some(late) = held.take() {
                        ws.send(Message::text(late.to_string())).await.unwrap();
                    }
                }
                ctl = ctl_rx.recv() => match ctl {
                    Some(Control::Event(frame)) => {
                        ws.send(Message::text(frame.to_string())).await.unwrap();
                    }
                    Some(Control::Close) | None => {
                        let _ = ws.close(None).await;
                        break;
                    }
                }
            }
        }
    });

    (port, ctl_tx)
}

fn response(request_type: &str, d: &Value, handler: Handler) -> Value {
    let data = d.get("requestData").cloned().unwrap_or(Value::Null);
    let mut body = json!({
        "requestType": request_type,
        "requestId": d["requestId"],
    });
    match handler(request_type, &data) {
        Ok(value) => {
            body["requestStatus"] = json!({ "result": true, "code": 100 });
            if !value.is_null() {
                body["responseData"] = value;
            }
        }
        Err((code, comment)) => {
            body["requestStatus"] = json!({ "result": false, "code": code, "comment": comment });
        }
    }
    json!({ "op": 7, "d": body })
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn local(port: u16) -> ConnectTarget {
    ConnectTarget::new("127.0.0.1", port)
}

// ── Handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_without_auth() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();

    let version = client.request("GetVersion", None).await.unwrap();
    assert_eq!(version["obsVersion"], "30.1.2");
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_connect_with_correct_password() {
    let (port, _ctl) = spawn_fake_obs(Some("supersecretpassword"), default_handler).await;
    let target = local(port).with_password(SecretString::from("supersecretpassword"));
    let client = ObsClient::connect(&target, TransportConfig::default())
        .await
        .unwrap();

    let scenes = client.request("GetSceneList", None).await.unwrap();
    assert_eq!(scenes["currentProgramSceneName"], "Principal");
}

#[tokio::test]
async fn test_challenge_without_password_is_auth_error() {
    let (port, _ctl) = spawn_fake_obs(Some("pw"), default_handler).await;
    let result = ObsClient::connect(&local(port), TransportConfig::default()).await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let (port, _ctl) = spawn_fake_obs(Some("right"), default_handler).await;
    let target = local(port).with_password(SecretString::from("wrong"));
    let err = ObsClient::connect(&target, TransportConfig::default())
        .await
        .err()
        .unwrap();
    match err {
        Error::Authentication { message } => assert!(message.contains("4009")),
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refused_connection() {
    // Bind and immediately drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let result = ObsClient::connect(&local(port), TransportConfig::default()).await;
    assert!(matches!(result, Err(Error::WebSocketConnect(_))));
}

// ── Requests ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_data_round_trip() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();

    let echoed = client
        .request("Echo", Some(json!({ "inputName": "Mic", "inputVolumeMul": 0.5 })))
        .await
        .unwrap();
    assert_eq!(echoed["inputVolumeMul"], 0.5);

    // Success without responseData comes back as Null.
    let empty = client.request("StartStream", None).await.unwrap();
    assert_eq!(empty, Value::Null);
}

#[tokio::test]
async fn test_rejected_request_maps_status() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();

    let err = client
        .request("SetInputMute", Some(json!({ "inputName": "Nope", "inputMuted": true })))
        .await
        .unwrap_err();
    assert_eq!(err.request_code(), Some(600));
    assert!(!err.is_connection_lost());
    assert!(err.to_string().contains("SetInputMute"));
}

#[tokio::test]
async fn test_pipelined_responses_are_matched_by_id() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();

    let (slow, fast) = tokio::join!(
        client.request("Slow", None),
        async {
            // Let `Slow` reach the server first.
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.request("GetVersion", None).await
        }
    );
    assert_eq!(slow.unwrap()["slow"], true);
    assert_eq!(fast.unwrap()["obsVersion"], "30.1.2");
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let config = TransportConfig {
        request_timeout: Duration::from_millis(200),
    };
    let client = ObsClient::connect(&local(port), config).await.unwrap();

    let err = client.request("Never", None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 200, .. }));
    assert_eq!(client.in_flight(), 0);
}

// ── Signals ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_are_broadcast() {
    let (port, ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();
    let mut signals = Link::signals(&client);

    ctl.send(Control::Event(json!({
        "op": 5,
        "d": {
            "eventType": "CurrentProgramSceneChanged",
            "eventIntent": 4,
            "eventData": { "sceneName": "Final" }
        }
    })))
    .unwrap();

    let signal = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap()
        .unwrap();
    match signal.as_ref() {
        Signal::Event(RemoteEvent::CurrentProgramSceneChanged { scene_name }) => {
            assert_eq!(scene_name, "Final");
        }
        other => panic!("unexpected signal {other:?}"),
    }
}

#[tokio::test]
async fn test_server_close_signals_once_and_fails_calls() {
    let (port, ctl) = spawn_fake_obs(None, default_handler).await;
    let client = ObsClient::connect(&local(port), TransportConfig::default())
        .await
        .unwrap();
    let mut signals = Link::signals(&client);

    ctl.send(Control::Close).unwrap();

    let signal = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(signal.as_ref(), Signal::Closed { .. }));
    assert!(client.is_closed());

    let err = client.request("GetVersion", None).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed { .. }));
    assert!(err.is_connection_lost());

    // No second Closed.
    let again = tokio::time::timeout(Duration::from_millis(100), signals.recv()).await;
    assert!(!matches!(again, Ok(Ok(ref s)) if matches!(s.as_ref(), Signal::Closed { .. })));
}

// ── Connector ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connector_opens_link() {
    let (port, _ctl) = spawn_fake_obs(None, default_handler).await;
    let connector = WebSocketConnector::new(TransportConfig::default());
    let link: Arc<dyn Link> = connector.open(&local(port)).await.unwrap();

    let version = link.call("GetVersion", None).await.unwrap();
    assert_eq!(version["rpcVersion"], 1);

    link.close().await;
    link.close().await;
}
