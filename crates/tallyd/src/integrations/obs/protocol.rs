//! obs-websocket v5 message plumbing.
//!
//! Only the slice of the protocol the tracker needs: the Hello/Identify
//! handshake with its SHA-256 challenge auth, the Scenes event category, and
//! the three resync requests. Payloads are handled as `serde_json::Value`;
//! typed structs exist only for what we actually consume.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::tracker::Scene;

pub const RPC_VERSION: u32 = 1;

/// `Scenes` event category bit; covers program/preview/scene-list changes.
pub const EVENT_SUBSCRIPTION_SCENES: u32 = 1 << 2;

pub const OP_HELLO: u8 = 0;
pub const OP_IDENTIFY: u8 = 1;
pub const OP_IDENTIFIED: u8 = 2;
pub const OP_EVENT: u8 = 5;
pub const OP_REQUEST: u8 = 6;
pub const OP_REQUEST_RESPONSE: u8 = 7;

/// Envelope of every server-to-client message.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

/// Challenge response: base64(sha256(base64(sha256(password + salt)) + challenge)).
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{salt}")));
    BASE64.encode(Sha256::digest(format!("{secret}{challenge}")))
}

/// Build the Identify message answering a Hello, attaching the challenge
/// response when the server requires authentication.
pub fn identify_message(password: &str, hello: &Value) -> Value {
    let mut d = json!({
        "rpcVersion": RPC_VERSION,
        "eventSubscriptions": EVENT_SUBSCRIPTION_SCENES,
    });
    if let Some(auth) = hello.get("authentication") {
        let salt = auth.get("salt").and_then(Value::as_str).unwrap_or_default();
        let challenge = auth
            .get("challenge")
            .and_then(Value::as_str)
            .unwrap_or_default();
        d["authentication"] = Value::String(auth_response(password, salt, challenge));
    }
    json!({ "op": OP_IDENTIFY, "d": d })
}

pub fn request_message(request_id: &str, request_type: &str) -> Value {
    json!({
        "op": OP_REQUEST,
        "d": {
            "requestType": request_type,
            "requestId": request_id,
        }
    })
}

/// Scene list out of a `GetSceneList` response or `SceneListChanged` event.
pub fn parse_scenes(data: &Value) -> Vec<Scene> {
    data.get("scenes")
        .and_then(Value::as_array)
        .map(|scenes| {
            scenes
                .iter()
                .filter_map(|s| {
                    Some(Scene {
                        index: s.get("sceneIndex").and_then(Value::as_u64)? as u32,
                        name: s.get("sceneName").and_then(Value::as_str)?.to_string(),
                        uuid: s.get("sceneUuid").and_then(Value::as_str)?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_answers_auth_challenge() {
        let hello = json!({
            "rpcVersion": 1,
            "authentication": {
                "challenge": "ch+llenge",
                "salt": "s+lt",
            }
        });
        let identify = identify_message("secret", &hello);
        assert_eq!(identify["op"], OP_IDENTIFY);
        assert_eq!(identify["d"]["rpcVersion"], RPC_VERSION);
        assert_eq!(
            identify["d"]["eventSubscriptions"],
            EVENT_SUBSCRIPTION_SCENES
        );
        assert_eq!(
            identify["d"]["authentication"],
            json!(auth_response("secret", "s+lt", "ch+llenge"))
        );
    }

    #[test]
    fn identify_without_auth_omits_authentication() {
        let hello = json!({ "rpcVersion": 1 });
        let identify = identify_message("ignored", &hello);
        assert!(identify["d"].get("authentication").is_none());
    }

    #[test]
    fn auth_response_is_deterministic_and_base64() {
        let a = auth_response("pw", "salt", "challenge");
        let b = auth_response("pw", "salt", "challenge");
        assert_eq!(a, b);
        // A SHA-256 digest in base64 is 44 characters with padding.
        assert_eq!(a.len(), 44);
        assert_ne!(a, auth_response("other", "salt", "challenge"));
    }

    #[test]
    fn parses_scene_list_payload() {
        let data = json!({
            "currentProgramSceneName": "Main",
            "scenes": [
                { "sceneIndex": 0, "sceneName": "Main", "sceneUuid": "uuid-a" },
                { "sceneIndex": 1, "sceneName": "Interview", "sceneUuid": "uuid-b" },
            ]
        });
        let scenes = parse_scenes(&data);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].name, "Interview");
        assert_eq!(scenes[1].uuid, "uuid-b");
    }

    #[test]
    fn malformed_scene_entries_are_skipped() {
        let data = json!({ "scenes": [ { "sceneName": "no uuid" } ] });
        assert!(parse_scenes(&data).is_empty());
    }
}
