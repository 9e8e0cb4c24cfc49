//! Wire shapes of the on-device web server.
//!
//! The firmware answers every endpoint with a small fixed JSON document;
//! anything that fails to parse into these shapes is treated as a malformed
//! response by the client, logged, and never fatal.

use serde::Deserialize;
use serde::Serialize;

/// Device self-report from `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub hostname: String,
    pub ip: String,
    pub tally_state: String,
    pub brightness: u8,
    pub millis: u64,
    pub rssi: i32,
    pub utc_epoch: u64,
    pub git_hash: String,
    pub git_dirty: bool,
    #[serde(default)]
    pub states: Vec<StateEntry>,
}

/// One entry of the device's advertised state table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: u8,
    pub name: String,
}

/// Response to `GET /set`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponse {
    pub success: bool,
    #[serde(default)]
    pub tally_state: Option<String>,
    #[serde(default)]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to `GET /identify` and `GET /restart`.
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_firmware_self_report() {
        let body = r#"{
            "hostname": "Tallylight-A1B2C3",
            "ip": "10.0.0.17",
            "tallyState": "PROGRAM",
            "brightness": 255,
            "millis": 123456,
            "rssi": -54,
            "utcEpoch": 1724800000,
            "gitHash": "deadbeef",
            "gitDirty": false,
            "states": [
                {"id": 0, "name": "OFF"},
                {"id": 1, "name": "STANDBY"},
                {"id": 2, "name": "PROGRAM"},
                {"id": 3, "name": "PREVIEW"},
                {"id": 4, "name": "ERROR"}
            ]
        }"#;

        let info: DeviceInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.hostname, "Tallylight-A1B2C3");
        assert_eq!(info.tally_state, "PROGRAM");
        assert_eq!(info.states.len(), 5);
        assert_eq!(info.states[4].name, "ERROR");
    }

    #[test]
    fn parses_set_failure_payload() {
        let body = r#"{"success": false, "error": "Invalid state value"}"#;
        let resp: SetResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Invalid state value"));
    }

    #[test]
    fn parses_set_success_payload() {
        let body = r#"{"success": true, "tallyState": "PREVIEW", "brightness": 200}"#;
        let resp: SetResponse = serde_json::from_str(body).unwrap();
        assert!(resp.success);
        assert_eq!(resp.brightness, Some(200));
    }
}
