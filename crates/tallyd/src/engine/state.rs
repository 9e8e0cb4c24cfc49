//! Derived tally state and the observed-state cache.
//!
//! `desired_state` is the heart of the reconciliation engine: a pure function
//! from (configured scene set, switcher state) to the display state a light
//! must show. Everything else in this module is bookkeeping around it.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumString;
use tokio::sync::RwLock;

use crate::device::DeviceInfo;
use crate::tracker::SceneId;
use crate::tracker::SwitcherState;

/// Display state of a tally light. The serialized form is the exact string
/// the device firmware accepts in `GET /set?state=...`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TallyState {
    Off,
    Standby,
    Program,
    Preview,
    Error,
}

/// Compute the state a light must display.
///
/// Dominance order, which must hold exactly:
/// ERROR > PROGRAM > PREVIEW > STANDBY > OFF. PROGRAM beating PREVIEW matters
/// when a scene is simultaneously program and preview, which some switcher
/// configurations produce.
pub fn desired_state(visible: &HashSet<SceneId>, switcher: &SwitcherState) -> TallyState {
    let (program, preview) = match switcher {
        SwitcherState::Disconnected => return TallyState::Error,
        SwitcherState::Connected { program, preview } => (program, preview),
    };

    // Both identifiers absent means no active program: the switcher is
    // effectively unreachable and every light shows the operator-visible
    // error signal.
    if program.is_none() && preview.is_none() {
        return TallyState::Error;
    }

    if program.as_ref().is_some_and(|p| visible.contains(p)) {
        return TallyState::Program;
    }
    if preview.as_ref().is_some_and(|p| visible.contains(p)) {
        return TallyState::Preview;
    }
    if !visible.is_empty() {
        return TallyState::Standby;
    }
    TallyState::Off
}

/// Recorded intent for one configured light.
///
/// `desired` reflects what the last pass computed, recorded before delivery
/// is attempted; `confirmed` is true only once the device acknowledged that
/// state. The control panel shows intent and uses the flag as its staleness
/// indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LightStatus {
    pub desired: TallyState,
    pub confirmed: bool,
}

/// Observability cache fed by reconciliation passes and the info poll.
/// Last-write-wins between overlapping passes; the periodic pass corrects
/// any stale overwrite within one interval.
pub struct StatusCache {
    lights: RwLock<HashMap<String, LightStatus>>,
    info: RwLock<HashMap<String, DeviceInfo>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self {
            lights: RwLock::new(HashMap::new()),
            info: RwLock::new(HashMap::new()),
        }
    }

    /// Record computed intent, clearing any previous confirmation.
    pub async fn record_desired(&self, fqdn: &str, desired: TallyState) {
        self.lights.write().await.insert(
            fqdn.to_string(),
            LightStatus {
                desired,
                confirmed: false,
            },
        );
    }

    /// Mark a delivery as acknowledged. Skipped if a newer pass has already
    /// recorded a different intent for this light.
    pub async fn confirm(&self, fqdn: &str, delivered: TallyState) {
        if let Some(status) = self.lights.write().await.get_mut(fqdn) {
            if status.desired == delivered {
                status.confirmed = true;
            }
        }
    }

    /// Drop status entries for lights that are no longer configured. Called
    /// once per pass with the configured set; device info is kept since it is
    /// reported for unconfigured devices too.
    pub async fn retain_lights(&self, configured: &HashSet<String>) {
        self.lights
            .write()
            .await
            .retain(|fqdn, _| configured.contains(fqdn));
    }

    pub async fn record_info(&self, fqdn: &str, info: DeviceInfo) {
        self.info.write().await.insert(fqdn.to_string(), info);
    }

    pub async fn light_statuses(&self) -> HashMap<String, LightStatus> {
        self.lights.read().await.clone()
    }

    pub async fn device_info(&self) -> HashMap<String, DeviceInfo> {
        self.info.read().await.clone()
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenes(ids: &[&str]) -> HashSet<SceneId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn connected(program: Option<&str>, preview: Option<&str>) -> SwitcherState {
        SwitcherState::Connected {
            program: program.map(str::to_string),
            preview: preview.map(str::to_string),
        }
    }

    #[test]
    fn disconnected_is_error_regardless_of_scenes() {
        for visible in [scenes(&[]), scenes(&["scene-a", "scene-b"])] {
            assert_eq!(
                desired_state(&visible, &SwitcherState::Disconnected),
                TallyState::Error
            );
        }
    }

    #[test]
    fn no_active_program_is_error() {
        assert_eq!(
            desired_state(&scenes(&["scene-a"]), &connected(None, None)),
            TallyState::Error
        );
    }

    #[test]
    fn program_scene_match_is_program() {
        assert_eq!(
            desired_state(
                &scenes(&["scene-a"]),
                &connected(Some("scene-a"), Some("scene-b"))
            ),
            TallyState::Program
        );
    }

    #[test]
    fn program_dominates_preview_when_both_match() {
        // The same scene can be program and preview at once.
        assert_eq!(
            desired_state(
                &scenes(&["scene-a"]),
                &connected(Some("scene-a"), Some("scene-a"))
            ),
            TallyState::Program
        );
    }

    #[test]
    fn preview_scene_match_is_preview() {
        assert_eq!(
            desired_state(
                &scenes(&["scene-b"]),
                &connected(Some("scene-a"), Some("scene-b"))
            ),
            TallyState::Preview
        );
    }

    #[test]
    fn configured_but_not_live_is_standby() {
        assert_eq!(
            desired_state(
                &scenes(&["scene-a"]),
                &connected(Some("scene-c"), Some("scene-b"))
            ),
            TallyState::Standby
        );
    }

    #[test]
    fn no_configured_scenes_is_off() {
        assert_eq!(
            desired_state(&scenes(&[]), &connected(Some("scene-a"), None)),
            TallyState::Off
        );
    }

    #[test]
    fn wire_strings_match_firmware() {
        assert_eq!(TallyState::Off.to_string(), "OFF");
        assert_eq!(TallyState::Standby.to_string(), "STANDBY");
        assert_eq!(TallyState::Program.to_string(), "PROGRAM");
        assert_eq!(TallyState::Preview.to_string(), "PREVIEW");
        assert_eq!(TallyState::Error.to_string(), "ERROR");
        assert_eq!("ERROR".parse::<TallyState>().unwrap(), TallyState::Error);
    }

    #[tokio::test]
    async fn confirmation_ignored_after_newer_intent() {
        let cache = StatusCache::new();
        cache.record_desired("light-1", TallyState::Program).await;
        cache.record_desired("light-1", TallyState::Standby).await;

        // A slow delivery from the first pass settles late.
        cache.confirm("light-1", TallyState::Program).await;

        let statuses = cache.light_statuses().await;
        let status = statuses.get("light-1").unwrap();
        assert_eq!(status.desired, TallyState::Standby);
        assert!(!status.confirmed);
    }

    #[tokio::test]
    async fn confirmation_marks_current_intent() {
        let cache = StatusCache::new();
        cache.record_desired("light-1", TallyState::Program).await;
        cache.confirm("light-1", TallyState::Program).await;

        let statuses = cache.light_statuses().await;
        assert!(statuses.get("light-1").unwrap().confirmed);
    }
}
