//! Device registry.
//!
//! The authoritative set of currently-reachable tally lights, populated by
//! discovery up/down events and trimmed by the liveness monitor. Discovery is
//! edge-triggered and flaky by nature: duplicate "up" events and "down" after
//! "up" out of order are both expected and must be harmless.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;

/// One discovered tally light, keyed by its fully-qualified service name.
#[derive(Debug, Clone)]
pub struct Device {
    pub fqdn: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,

    /// Set on the first successful liveness probe, never by discovery.
    /// A device that has never answered a ping keeps `None` and is exempt
    /// from staleness eviction (tolerates slow device boot).
    pub last_alive: Option<Instant>,
}

impl Device {
    /// Primary address for HTTP delivery, if the advertisement carried any.
    pub fn address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// Registry of reachable devices. Single-writer-conceptually (discovery and
/// the liveness monitor), multi-reader (the engine snapshots each pass).
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a device record. Idempotent; a repeat "up" event for
    /// the same identity keeps the existing last-alive timestamp and takes
    /// the latest addresses and port.
    pub async fn service_up(&self, fqdn: String, addresses: Vec<IpAddr>, port: u16) {
        let mut devices = self.devices.write().await;
        match devices.get_mut(&fqdn) {
            Some(existing) => {
                debug!(%fqdn, "discovery refresh for known device");
                existing.addresses = addresses;
                existing.port = port;
            }
            None => {
                info!(%fqdn, ?addresses, port, "device discovered");
                devices.insert(
                    fqdn.clone(),
                    Device {
                        fqdn,
                        addresses,
                        port,
                        last_alive: None,
                    },
                );
            }
        }
    }

    /// Remove a device record unconditionally. No error if absent.
    pub async fn service_down(&self, fqdn: &str) {
        if self.devices.write().await.remove(fqdn).is_some() {
            info!(%fqdn, "device removed by discovery");
        }
    }

    /// Snapshot of current records, not a live view.
    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn get(&self, fqdn: &str) -> Option<Device> {
        self.devices.read().await.get(fqdn).cloned()
    }

    /// Record a successful liveness probe.
    pub async fn mark_alive(&self, fqdn: &str, when: Instant) {
        if let Some(device) = self.devices.write().await.get_mut(fqdn) {
            device.last_alive = Some(when);
        }
    }

    /// Evict devices whose last successful probe is older than `staleness`.
    /// Eviction is driven by elapsed time, not by individual probe failures,
    /// so a single missed ping does not remove a device. Devices that have
    /// never answered a probe are left alone; only a discovery "down" event
    /// removes those.
    pub async fn evict_stale(&self, staleness: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut devices = self.devices.write().await;
        let stale: Vec<String> = devices
            .values()
            .filter(|d| {
                d.last_alive
                    .is_some_and(|alive| now.duration_since(alive) > staleness)
            })
            .map(|d| d.fqdn.clone())
            .collect();
        for fqdn in &stale {
            info!(%fqdn, "evicting device, no ping response within staleness window");
            devices.remove(fqdn);
        }
        stale
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
