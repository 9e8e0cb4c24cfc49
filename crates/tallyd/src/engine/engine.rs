//! Reconciliation engine.
//!
//! Maintains the authoritative registry/tracker views by applying events, and
//! continuously reconciles every configured light against them: compute the
//! desired display state, record it, push it to reachable devices. Passes are
//! triggered by every event and by a fixed-interval safety net against missed
//! events; overlapping passes are allowed (at-least-once delivery, last-write
//! wins on the cache, corrected within one interval).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::event::EngineEvent;
use super::state::desired_state;
use super::state::StatusCache;
use crate::device::DeviceAddr;
use crate::device::DeviceCommands;
use crate::error::DeviceError;
use crate::registry::DeviceRegistry;
use crate::store::ConfigStore;
use crate::tracker::SwitcherTracker;

/// Safety-net reconciliation interval.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state handed to every component. No ambient singletons; everything
/// that reads or mutates system state goes through this object.
pub struct Context {
    pub registry: DeviceRegistry,
    pub tracker: SwitcherTracker,
    pub store: ConfigStore,
    pub status: StatusCache,
    pub client: Arc<dyn DeviceCommands>,
    pub events: mpsc::UnboundedSender<EngineEvent>,
}

/// The engine's event loop half. Owns the receiving end of the event channel;
/// everything else lives in the shared [`Context`].
pub struct Engine {
    ctx: Arc<Context>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Engine {
    pub fn new(ctx: Arc<Context>, rx: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self { ctx, rx }
    }

    /// Run until every event sender is dropped. The first interval tick fires
    /// immediately, giving a full pass at startup.
    pub async fn run(mut self) {
        info!("engine starting");
        let mut safety_net = tokio::time::interval(RECONCILE_INTERVAL);
        safety_net.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = safety_net.tick() => self.spawn_pass(),
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
        info!("engine shutting down");
    }

    /// Apply one event to the owning component, then reconcile.
    async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::ServiceUp {
                fqdn,
                addresses,
                port,
            } => {
                self.ctx.registry.service_up(fqdn, addresses, port).await;
            }
            EngineEvent::ServiceDown { fqdn } => {
                self.ctx.registry.service_down(&fqdn).await;
            }
            EngineEvent::ProgramChanged(scene) => {
                self.ctx.tracker.set_program(scene).await;
            }
            EngineEvent::PreviewChanged(scene) => {
                self.ctx.tracker.set_preview(scene).await;
            }
            EngineEvent::SwitcherConnected { program, preview } => {
                self.ctx.tracker.set_connected(program, preview).await;
            }
            EngineEvent::SwitcherDisconnected => {
                self.ctx.tracker.set_disconnected().await;
            }
            EngineEvent::ScenesUpdated(scenes) => {
                self.ctx.tracker.set_scenes(scenes).await;
            }
            EngineEvent::ConfigChanged | EngineEvent::Reconcile => {}
        }
        self.spawn_pass();
    }

    /// Passes run detached so a slow device never blocks event processing or
    /// the next trigger.
    fn spawn_pass(&self) {
        let ctx = self.ctx.clone();
        tokio::spawn(reconcile_pass(ctx));
    }
}

/// One full recomputation-and-delivery cycle across all configured lights.
///
/// The configured set drives the pass, not the discovered set: a configured
/// light whose device is offline still gets its intent recorded, and a
/// discovered-but-unconfigured device is never driven.
pub async fn reconcile_pass(ctx: Arc<Context>) {
    let lights = ctx.store.lights().await;
    let switcher = ctx.tracker.snapshot().await;
    let devices: HashMap<String, _> = ctx
        .registry
        .list()
        .await
        .into_iter()
        .map(|d| (d.fqdn.clone(), d))
        .collect();

    ctx.status
        .retain_lights(&lights.keys().cloned().collect())
        .await;

    let mut deliveries = JoinSet::new();
    for (fqdn, light) in lights {
        let desired = desired_state(&light.visible_in_scenes, &switcher);

        // Intent is recorded before delivery is attempted; the control panel
        // must reflect it even when the device is unreachable.
        ctx.status.record_desired(&fqdn, desired).await;

        let Some(device) = devices.get(&fqdn) else {
            debug!(%fqdn, "configured light not discovered, skipping delivery");
            continue;
        };
        let Some(ip) = device.address() else {
            warn!(%fqdn, "device advertised no address, cannot deliver");
            continue;
        };
        let target = DeviceAddr {
            ip,
            port: device.port,
        };

        let ctx = ctx.clone();
        let brightness = light.brightness;
        deliveries.spawn(async move {
            match ctx.client.set_state(target, desired, brightness).await {
                Ok(()) => {
                    debug!(%fqdn, state = %desired, brightness, "state delivered");
                    ctx.status.confirm(&fqdn, desired).await;
                }
                Err(DeviceError::AuthRejected) => {
                    warn!(%fqdn, "device rejected access key, check provisioning");
                }
                Err(DeviceError::Rejected(reason)) => {
                    warn!(%fqdn, %reason, "device rejected state command");
                }
                Err(err) => {
                    debug!(%fqdn, %err, "delivery failed, retried by next pass");
                }
            }
        });
    }

    // Settle all deliveries. Each is independent and individually bounded by
    // the client timeout, so one slow device only delays this join, never a
    // sibling delivery or the next pass.
    while deliveries.join_next().await.is_some() {}
}
