//! Persisted configuration document.
//!
//! One JSON file holds the per-light policies alongside the switcher address,
//! its password, and the shared device access key. Wire field names are
//! camelCase; unknown fields are dropped and missing fields take defaults,
//! which doubles as the shallow version-migration rule.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::tracker::SceneId;

/// Current schema version. Loading a document with a different version
/// shallow-merges it over defaults and rewrites the file.
pub const CONFIG_VERSION: u32 = 1;

/// Visibility policy for one configured light, keyed by device FQDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightConfig {
    /// Display brightness, clamped to 0-255 by construction (u8).
    pub brightness: u8,

    /// Scenes in which this light is considered visible. Membership only,
    /// no ordering significance.
    pub visible_in_scenes: HashSet<SceneId>,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            brightness: 255,
            visible_in_scenes: HashSet::new(),
        }
    }
}

/// The full on-disk document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDocument {
    pub lights: HashMap<String, LightConfig>,
    pub obs_address: String,
    pub obs_password: String,
    pub api_key: String,
    pub version: u32,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            lights: HashMap::new(),
            obs_address: "127.0.0.1:4455".to_string(),
            obs_password: String::new(),
            api_key: String::new(),
            version: CONFIG_VERSION,
        }
    }
}

impl ConfigDocument {
    /// Load the document, writing defaults first if the file is missing and
    /// rewriting after a version migration. Runs once at startup, so blocking
    /// I/O is fine here.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, writing defaults");
            let doc = Self::default();
            doc.write(path)?;
            return Ok(doc);
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut doc: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;

        if doc.version != CONFIG_VERSION {
            info!(
                from = doc.version,
                to = CONFIG_VERSION,
                "migrating config document"
            );
            doc.version = CONFIG_VERSION;
            doc.write(path)?;
        }

        Ok(doc)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.json");

        let doc = ConfigDocument::load(&path).unwrap();
        assert_eq!(doc, ConfigDocument::default());
        assert!(path.exists());

        // Loading again reads back the same document.
        let reloaded = ConfigDocument::load(&path).unwrap();
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn version_mismatch_merges_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.json");
        std::fs::write(&path, r#"{"version": 0, "apiKey": "secret"}"#).unwrap();

        let doc = ConfigDocument::load(&path).unwrap();
        assert_eq!(doc.version, CONFIG_VERSION);
        assert_eq!(doc.api_key, "secret");
        // Missing sections came from defaults.
        assert_eq!(doc.obs_address, "127.0.0.1:4455");

        let raw = std::fs::read_to_string(&path).unwrap();
        let rewritten: ConfigDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(rewritten.version, CONFIG_VERSION);
    }

    #[test]
    fn light_entries_round_trip_camel_case() {
        let mut doc = ConfigDocument::default();
        doc.lights.insert(
            "light-1.local.".to_string(),
            LightConfig {
                brightness: 200,
                visible_in_scenes: ["scene-a".to_string()].into_iter().collect(),
            },
        );

        let raw = serde_json::to_string(&doc).unwrap();
        assert!(raw.contains("visibleInScenes"));
        assert!(raw.contains("obsAddress"));

        let parsed: ConfigDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, doc);
    }
}
