//! Light configuration store.
//!
//! Owns the persisted per-light visibility policies. Every successful
//! mutation persists the whole document on the mutating call path and then
//! nudges the engine asynchronously. A failed write is logged and swallowed:
//! the in-memory state stays authoritative and the next successful mutation
//! retries the file.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

use crate::config::ConfigDocument;
use crate::config::LightConfig;
use crate::engine::EngineEvent;
use crate::error::ConfigError;
use crate::tracker::SceneId;

pub struct ConfigStore {
    path: PathBuf,
    doc: RwLock<ConfigDocument>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl ConfigStore {
    pub fn new(
        path: PathBuf,
        doc: ConfigDocument,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            path,
            doc: RwLock::new(doc),
            events,
        }
    }

    /// Snapshot of all configured lights; the driving set of every
    /// reconciliation pass.
    pub async fn lights(&self) -> HashMap<String, LightConfig> {
        self.doc.read().await.lights.clone()
    }

    pub async fn get(&self, fqdn: &str) -> Option<LightConfig> {
        self.doc.read().await.lights.get(fqdn).cloned()
    }

    /// Configure a light with defaults (full brightness, no scenes). The
    /// device does not have to be present in the registry; any identity
    /// string is accepted and delivery simply waits for discovery.
    pub async fn add(&self, fqdn: &str) -> Result<(), ConfigError> {
        {
            let mut doc = self.doc.write().await;
            if doc.lights.contains_key(fqdn) {
                return Err(ConfigError::AlreadyExists(fqdn.to_string()));
            }
            doc.lights.insert(fqdn.to_string(), LightConfig::default());
        }
        info!(%fqdn, "light configured");
        self.persist_and_notify().await;
        Ok(())
    }

    pub async fn remove(&self, fqdn: &str) -> Result<(), ConfigError> {
        {
            let mut doc = self.doc.write().await;
            if doc.lights.remove(fqdn).is_none() {
                return Err(ConfigError::NotFound(fqdn.to_string()));
            }
        }
        info!(%fqdn, "light unconfigured");
        self.persist_and_notify().await;
        Ok(())
    }

    pub async fn set_brightness(&self, fqdn: &str, value: i64) -> Result<(), ConfigError> {
        let brightness = u8::try_from(value).map_err(|_| ConfigError::OutOfRange(value))?;
        {
            let mut doc = self.doc.write().await;
            let light = doc
                .lights
                .get_mut(fqdn)
                .ok_or_else(|| ConfigError::NotFound(fqdn.to_string()))?;
            light.brightness = brightness;
        }
        self.persist_and_notify().await;
        Ok(())
    }

    /// Replace the visible-scene set wholesale; no merge.
    pub async fn set_visible_scenes(
        &self,
        fqdn: &str,
        scenes: HashSet<SceneId>,
    ) -> Result<(), ConfigError> {
        {
            let mut doc = self.doc.write().await;
            let light = doc
                .lights
                .get_mut(fqdn)
                .ok_or_else(|| ConfigError::NotFound(fqdn.to_string()))?;
            light.visible_in_scenes = scenes;
        }
        self.persist_and_notify().await;
        Ok(())
    }

    /// Write the document, then trigger a reconciliation pass. Persistence
    /// failure is logged, never surfaced to the API caller.
    async fn persist_and_notify(&self) {
        let (raw, path) = {
            let doc = self.doc.read().await;
            (serde_json::to_string_pretty(&*doc), self.path.clone())
        };
        match raw {
            Ok(raw) => {
                if let Err(err) = tokio::fs::write(&path, raw).await {
                    warn!(path = %path.display(), %err, "failed to persist config");
                }
            }
            Err(err) => warn!(%err, "failed to serialize config"),
        }
        let _ = self.events.send(EngineEvent::ConfigChanged);
    }
}
