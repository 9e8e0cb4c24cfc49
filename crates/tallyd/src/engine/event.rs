//! Events feeding the reconciliation engine.
//!
//! Discovery, the switcher integration, the configuration store, and the
//! liveness monitor all speak to the engine through this one enum over an
//! unbounded channel, decoupling event sources from pass logic.

use std::net::IpAddr;

use crate::tracker::Scene;
use crate::tracker::SceneId;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Discovery resolved a device advertisement.
    ServiceUp {
        fqdn: String,
        addresses: Vec<IpAddr>,
        port: u16,
    },

    /// Discovery reported the device gone.
    ServiceDown { fqdn: String },

    /// Switcher program scene changed.
    ProgramChanged(Option<SceneId>),

    /// Switcher preview scene changed.
    PreviewChanged(Option<SceneId>),

    /// Switcher (re)connected; carries the resync result.
    SwitcherConnected {
        program: Option<SceneId>,
        preview: Option<SceneId>,
    },

    /// Switcher connection lost.
    SwitcherDisconnected,

    /// Fresh scene list from the switcher.
    ScenesUpdated(Vec<Scene>),

    /// A light configuration mutation was persisted.
    ConfigChanged,

    /// Bare reconciliation request (liveness eviction, periodic safety net).
    Reconcile,
}
