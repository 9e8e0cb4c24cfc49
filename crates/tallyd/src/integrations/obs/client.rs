//! Persistent switcher connection.
//!
//! One session per connect: handshake, resync, then an event loop until the
//! connection drops. Any failure tears the session down, the engine is told
//! the switcher is gone, and a fresh connect is attempted on a fixed backoff.
//! The backoff is deliberately not exponential: this is a LAN service that is
//! expected to come back quickly, and operators are staring at ERROR lights
//! until it does.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::stream::SplitStream;
use futures_util::SinkExt;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tracing::info;
use tracing::warn;

use super::protocol;
use super::protocol::ServerMessage;
use crate::engine::EngineEvent;
use crate::error::SwitcherError;
use crate::tracker::SceneId;

/// Bound on every switcher request/response and the connect itself.
const SWITCHER_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed reconnect delay after a lost or failed connection.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug, Clone)]
pub struct ObsConfig {
    /// host:port of the obs-websocket server.
    pub address: String,
    pub password: String,
}

/// Connection supervisor; runs for the lifetime of the process.
pub async fn run(config: ObsConfig, events: mpsc::UnboundedSender<EngineEvent>) {
    loop {
        if let Err(err) = session(&config, &events).await {
            warn!(address = %config.address, %err, "switcher session ended");
        }
        let _ = events.send(EngineEvent::SwitcherDisconnected);
        tokio::time::sleep(RECONNECT_BACKOFF).await;
    }
}

async fn session(
    config: &ObsConfig,
    events: &mpsc::UnboundedSender<EngineEvent>,
) -> Result<(), SwitcherError> {
    let url = format!("ws://{}", config.address);
    let (ws, _) = timeout(SWITCHER_TIMEOUT, connect_async(&url))
        .await
        .map_err(|_| SwitcherError::Timeout)?
        .map_err(|err| SwitcherError::QueryFailed(err.to_string()))?;
    let (mut write, mut read) = ws.split();

    // Hello -> Identify -> Identified. A bad password makes the server close
    // the socket instead of sending Identified, surfacing as Disconnected.
    let hello = timeout(SWITCHER_TIMEOUT, read_message(&mut read))
        .await
        .map_err(|_| SwitcherError::Timeout)??;
    if hello.op != protocol::OP_HELLO {
        return Err(SwitcherError::QueryFailed(format!(
            "expected hello, got op {}",
            hello.op
        )));
    }
    send(&mut write, protocol::identify_message(&config.password, &hello.d)).await?;
    timeout(SWITCHER_TIMEOUT, async {
        loop {
            let msg = read_message(&mut read).await?;
            if msg.op == protocol::OP_IDENTIFIED {
                return Ok::<_, SwitcherError>(());
            }
        }
    })
    .await
    .map_err(|_| SwitcherError::Timeout)??;
    info!(address = %config.address, "switcher connected");

    // Resync. Two sequential reads; a transient mismatch between them is
    // tolerated. Preview is absent outside studio mode, which the server
    // reports as a failed request, not an error.
    let program = resync_request(&mut write, &mut read, events, "1", "GetCurrentProgramScene")
        .await?
        .and_then(|d| scene_field(&d, "currentProgramSceneUuid"));
    let preview = resync_request(&mut write, &mut read, events, "2", "GetCurrentPreviewScene")
        .await?
        .and_then(|d| scene_field(&d, "currentPreviewSceneUuid"));
    let _ = events.send(EngineEvent::SwitcherConnected { program, preview });

    if let Some(data) = resync_request(&mut write, &mut read, events, "3", "GetSceneList").await? {
        let _ = events.send(EngineEvent::ScenesUpdated(protocol::parse_scenes(&data)));
    }

    // Event loop until the connection drops. No timeout here; an idle
    // production is a healthy one.
    loop {
        let msg = read_message(&mut read).await?;
        if msg.op == protocol::OP_EVENT {
            forward_event(&msg.d, events);
        }
    }
}

/// Issue one request and wait for its response, forwarding any events that
/// interleave. Bounded so a wedged switcher cannot stall the session setup.
async fn resync_request(
    write: &mut WsWrite,
    read: &mut WsRead,
    events: &mpsc::UnboundedSender<EngineEvent>,
    request_id: &str,
    request_type: &str,
) -> Result<Option<Value>, SwitcherError> {
    send(write, protocol::request_message(request_id, request_type)).await?;
    timeout(SWITCHER_TIMEOUT, async {
        loop {
            let msg = read_message(read).await?;
            match msg.op {
                protocol::OP_EVENT => forward_event(&msg.d, events),
                protocol::OP_REQUEST_RESPONSE
                    if msg.d.get("requestId").and_then(Value::as_str) == Some(request_id) =>
                {
                    let ok = msg
                        .d
                        .pointer("/requestStatus/result")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    return Ok(if ok { msg.d.get("responseData").cloned() } else { None });
                }
                _ => {}
            }
        }
    })
    .await
    .map_err(|_| SwitcherError::Timeout)?
}

/// Translate a Scenes-category event into engine events.
fn forward_event(d: &Value, events: &mpsc::UnboundedSender<EngineEvent>) {
    let Some(event_type) = d.get("eventType").and_then(Value::as_str) else {
        return;
    };
    let data = d.get("eventData").cloned().unwrap_or(Value::Null);
    match event_type {
        "CurrentProgramSceneChanged" => {
            let _ = events.send(EngineEvent::ProgramChanged(scene_field(&data, "sceneUuid")));
        }
        "CurrentPreviewSceneChanged" => {
            let _ = events.send(EngineEvent::PreviewChanged(scene_field(&data, "sceneUuid")));
        }
        "SceneListChanged" => {
            let _ = events.send(EngineEvent::ScenesUpdated(protocol::parse_scenes(&data)));
        }
        _ => {}
    }
}

fn scene_field(data: &Value, key: &str) -> Option<SceneId> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

async fn send(write: &mut WsWrite, value: Value) -> Result<(), SwitcherError> {
    write
        .send(Message::Text(value.to_string()))
        .await
        .map_err(|err| SwitcherError::QueryFailed(err.to_string()))
}

async fn read_message(read: &mut WsRead) -> Result<ServerMessage, SwitcherError> {
    loop {
        let msg = read
            .next()
            .await
            .ok_or(SwitcherError::Disconnected)?
            .map_err(|err| SwitcherError::QueryFailed(err.to_string()))?;
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .map_err(|err| SwitcherError::QueryFailed(err.to_string()))
            }
            Message::Close(_) => return Err(SwitcherError::Disconnected),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn program_change_event_is_translated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_event(
            &json!({
                "eventType": "CurrentProgramSceneChanged",
                "eventData": { "sceneName": "Main", "sceneUuid": "uuid-a" }
            }),
            &tx,
        );
        match rx.try_recv().unwrap() {
            EngineEvent::ProgramChanged(scene) => assert_eq!(scene.as_deref(), Some("uuid-a")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn preview_change_event_is_translated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_event(
            &json!({
                "eventType": "CurrentPreviewSceneChanged",
                "eventData": { "sceneUuid": "uuid-b" }
            }),
            &tx,
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::PreviewChanged(Some(_))
        ));
    }

    #[test]
    fn scene_list_event_is_translated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_event(
            &json!({
                "eventType": "SceneListChanged",
                "eventData": {
                    "scenes": [
                        { "sceneIndex": 0, "sceneName": "Main", "sceneUuid": "uuid-a" }
                    ]
                }
            }),
            &tx,
        );
        match rx.try_recv().unwrap() {
            EngineEvent::ScenesUpdated(scenes) => assert_eq!(scenes.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_event(&json!({ "eventType": "InputVolumeChanged" }), &tx);
        assert!(rx.try_recv().is_err());
    }
}
