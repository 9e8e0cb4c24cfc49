//! Switcher state tracker.
//!
//! Holds the last-known program/preview scene of the video switcher. Mutated
//! only by switcher connection events; read as a snapshot by every
//! reconciliation pass. On connection loss the scene identifiers are not
//! cleared here — the `Disconnected` variant is what the engine matches on,
//! and stale values are replaced wholesale by the next successful resync.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Opaque scene identifier issued by the switcher (a UUID string in practice).
pub type SceneId = String;

/// One scene as reported by the switcher's scene list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub index: u32,
    pub name: String,
    pub uuid: SceneId,
}

/// Connection-aware switcher state.
///
/// Modelled as a tagged union rather than a pair of ad hoc nullables so the
/// ERROR rule in the engine is a total pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitcherState {
    Disconnected,
    Connected {
        program: Option<SceneId>,
        preview: Option<SceneId>,
    },
}

impl SwitcherState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SwitcherState::Connected { .. })
    }
}

/// Tracks the switcher connection plus the last-fetched scene list.
pub struct SwitcherTracker {
    state: RwLock<SwitcherState>,
    scenes: RwLock<Vec<Scene>>,
}

impl SwitcherTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SwitcherState::Disconnected),
            scenes: RwLock::new(Vec::new()),
        }
    }

    /// Apply a full resync result. Called by the switcher integration after
    /// every (re)connect, replacing whatever was staged before the outage.
    pub async fn set_connected(&self, program: Option<SceneId>, preview: Option<SceneId>) {
        let mut state = self.state.write().await;
        info!(?program, ?preview, "switcher connected");
        *state = SwitcherState::Connected { program, preview };
    }

    pub async fn set_disconnected(&self) {
        let mut state = self.state.write().await;
        if state.is_connected() {
            info!("switcher disconnected");
        }
        *state = SwitcherState::Disconnected;
    }

    /// Program-scene-changed event. Ignored while disconnected: an event
    /// racing a teardown must not resurrect a half-connected state.
    pub async fn set_program(&self, scene: Option<SceneId>) {
        let mut state = self.state.write().await;
        if let SwitcherState::Connected { program, .. } = &mut *state {
            *program = scene;
        }
    }

    /// Preview-scene-changed event. Same disconnected handling as `set_program`.
    pub async fn set_preview(&self, scene: Option<SceneId>) {
        let mut state = self.state.write().await;
        if let SwitcherState::Connected { preview, .. } = &mut *state {
            *preview = scene;
        }
    }

    pub async fn set_scenes(&self, scenes: Vec<Scene>) {
        *self.scenes.write().await = scenes;
    }

    /// Snapshot used by the engine; cheap clone of two options.
    pub async fn snapshot(&self) -> SwitcherState {
        self.state.read().await.clone()
    }

    pub async fn scenes(&self) -> Vec<Scene> {
        self.scenes.read().await.clone()
    }

    /// Scene names keyed by UUID, for log/API readability.
    pub async fn scene_names(&self) -> HashMap<SceneId, String> {
        self.scenes
            .read()
            .await
            .iter()
            .map(|s| (s.uuid.clone(), s.name.clone()))
            .collect()
    }
}

impl Default for SwitcherTracker {
    fn default() -> Self {
        Self::new()
    }
}
