//! Device liveness monitor and status poll.
//!
//! Two independent fixed-interval loops. The liveness sweep pings every
//! registered device concurrently and marks survivors alive; eviction is a
//! separate time-based rule so a single missed probe never removes a device.
//! The info poll refreshes each device's self-report for the control panel.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::debug;

use crate::device::DeviceAddr;
use crate::engine::Context;
use crate::engine::EngineEvent;

/// Liveness sweep period.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// A device whose last successful probe is older than this is evicted.
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(15);

/// Device self-report poll period.
pub const INFO_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run_liveness(ctx: Arc<Context>) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        sweep.tick().await;
        liveness_sweep(&ctx).await;
    }
}

/// One sweep: concurrent pings, then time-based eviction.
async fn liveness_sweep(ctx: &Arc<Context>) {
    let mut probes = JoinSet::new();
    for device in ctx.registry.list().await {
        let Some(ip) = device.address() else {
            debug!(fqdn = %device.fqdn, "no address to probe");
            continue;
        };
        let target = DeviceAddr {
            ip,
            port: device.port,
        };
        let client = ctx.client.clone();
        probes.spawn(async move { (device.fqdn, client.ping(target).await) });
    }

    while let Some(joined) = probes.join_next().await {
        let Ok((fqdn, result)) = joined else { continue };
        match result {
            Ok(()) => ctx.registry.mark_alive(&fqdn, Instant::now()).await,
            Err(err) => debug!(%fqdn, %err, "liveness probe failed"),
        }
    }

    // Eviction keys off elapsed time since the last success, independent of
    // this sweep's probe outcomes.
    let evicted = ctx.registry.evict_stale(STALENESS_THRESHOLD).await;
    if !evicted.is_empty() {
        let _ = ctx.events.send(EngineEvent::Reconcile);
    }
}

pub async fn run_info_poll(ctx: Arc<Context>) {
    let mut poll = tokio::time::interval(INFO_POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        poll.tick().await;
        info_poll(&ctx).await;
    }
}

async fn info_poll(ctx: &Arc<Context>) {
    let mut queries = JoinSet::new();
    for device in ctx.registry.list().await {
        let Some(ip) = device.address() else { continue };
        let target = DeviceAddr {
            ip,
            port: device.port,
        };
        let client = ctx.client.clone();
        queries.spawn(async move { (device.fqdn, client.query_info(target).await) });
    }

    while let Some(joined) = queries.join_next().await {
        let Ok((fqdn, result)) = joined else { continue };
        match result {
            Ok(info) => ctx.status.record_info(&fqdn, info).await,
            Err(err) => debug!(%fqdn, %err, "info poll failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::ConfigDocument;
    use crate::device::DeviceInfo;
    use crate::device::MockDeviceClient;
    use crate::engine::StatusCache;
    use crate::registry::DeviceRegistry;
    use crate::store::ConfigStore;
    use crate::tracker::SwitcherTracker;

    struct Fixture {
        ctx: Arc<Context>,
        client: Arc<MockDeviceClient>,
        rx: mpsc::UnboundedReceiver<EngineEvent>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(MockDeviceClient::new());
        let ctx = Arc::new(Context {
            registry: DeviceRegistry::new(),
            tracker: SwitcherTracker::new(),
            store: ConfigStore::new(
                dir.path().join("tally.json"),
                ConfigDocument::default(),
                tx.clone(),
            ),
            status: StatusCache::new(),
            client: client.clone(),
            events: tx,
        });
        Fixture {
            ctx,
            client,
            rx,
            _dir: dir,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn sample_info() -> DeviceInfo {
        DeviceInfo {
            hostname: "Tallylight-A1B2C3".to_string(),
            ip: "10.0.0.5".to_string(),
            tally_state: "OFF".to_string(),
            brightness: 255,
            millis: 1,
            rssi: -50,
            utc_epoch: 0,
            git_hash: "deadbeef".to_string(),
            git_dirty: false,
            states: Vec::new(),
        }
    }

    #[tokio::test]
    async fn successful_probe_marks_device_alive() {
        let f = fixture();
        f.ctx
            .registry
            .service_up("light-1.local.".into(), vec![ip("10.0.0.5")], 81)
            .await;

        liveness_sweep(&f.ctx).await;

        let device = f.ctx.registry.get("light-1.local.").await.unwrap();
        assert!(device.last_alive.is_some());
    }

    #[tokio::test]
    async fn failed_probe_alone_does_not_evict() {
        let f = fixture();
        f.ctx
            .registry
            .service_up("light-1.local.".into(), vec![ip("10.0.0.5")], 81)
            .await;
        f.client.mark_unreachable(ip("10.0.0.5"));

        liveness_sweep(&f.ctx).await;

        // Never answered a probe, so the staleness rule leaves it in place.
        assert!(f.ctx.registry.get("light-1.local.").await.is_some());
    }

    #[tokio::test]
    async fn stale_device_eviction_triggers_reconcile() {
        let mut f = fixture();
        f.ctx
            .registry
            .service_up("light-1.local.".into(), vec![ip("10.0.0.5")], 81)
            .await;
        let long_ago = Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        f.ctx.registry.mark_alive("light-1.local.", long_ago).await;
        f.client.mark_unreachable(ip("10.0.0.5"));

        liveness_sweep(&f.ctx).await;

        assert!(f.ctx.registry.get("light-1.local.").await.is_none());
        assert!(matches!(f.rx.recv().await, Some(EngineEvent::Reconcile)));
    }

    #[tokio::test]
    async fn info_poll_caches_self_report() {
        let f = fixture();
        f.ctx
            .registry
            .service_up("light-1.local.".into(), vec![ip("10.0.0.5")], 81)
            .await;
        f.client.serve_info(ip("10.0.0.5"), sample_info());

        info_poll(&f.ctx).await;

        let info = f.ctx.status.device_info().await;
        assert_eq!(
            info.get("light-1.local.").unwrap().hostname,
            "Tallylight-A1B2C3"
        );
    }
}
