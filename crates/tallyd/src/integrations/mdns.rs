//! Tally-light discovery over mDNS.
//!
//! Thin adapter between the service browser and the engine's event channel.
//! Discovery is edge-triggered; the registry absorbs duplicate "up" events
//! and out-of-order "down". The browse session is restarted on a fixed
//! interval as a workaround for browsers that silently stop delivering
//! events on flaky networks.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context as _;
use mdns_sd::ServiceDaemon;
use mdns_sd::ServiceEvent;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::warn;

use crate::engine::EngineEvent;

/// Service type the device firmware advertises.
pub const SERVICE_TYPE: &str = "_tallylight._tcp.local.";

/// How often the browse session is torn down and restarted.
pub const BROWSE_RESTART_INTERVAL: Duration = Duration::from_secs(60);

/// Start the discovery task. Fails only if the daemon cannot bind its
/// sockets, which is a startup-time problem.
pub fn spawn(events: mpsc::UnboundedSender<EngineEvent>) -> anyhow::Result<()> {
    let daemon = ServiceDaemon::new().context("starting mdns daemon")?;
    tokio::spawn(run(daemon, events));
    Ok(())
}

async fn run(daemon: ServiceDaemon, events: mpsc::UnboundedSender<EngineEvent>) {
    loop {
        let receiver = match daemon.browse(SERVICE_TYPE) {
            Ok(receiver) => receiver,
            Err(err) => {
                warn!(%err, "mdns browse failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        let restart = tokio::time::sleep(BROWSE_RESTART_INTERVAL);
        tokio::pin!(restart);
        loop {
            tokio::select! {
                _ = &mut restart => {
                    debug!("restarting mdns browse session");
                    if let Err(err) = daemon.stop_browse(SERVICE_TYPE) {
                        warn!(%err, "failed to stop mdns browse");
                    }
                    break;
                }
                event = receiver.recv_async() => match event {
                    Ok(event) => handle_event(event, &events),
                    Err(_) => {
                        warn!("mdns event channel closed, restarting browse");
                        break;
                    }
                },
            }
        }
    }
}

fn handle_event(event: ServiceEvent, events: &mpsc::UnboundedSender<EngineEvent>) {
    match event {
        ServiceEvent::ServiceResolved(info) => {
            let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
            let _ = events.send(EngineEvent::ServiceUp {
                fqdn: info.get_fullname().to_string(),
                addresses,
                port: info.get_port(),
            });
        }
        ServiceEvent::ServiceRemoved(_ty, fullname) => {
            let _ = events.send(EngineEvent::ServiceDown { fqdn: fullname });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_maps_to_service_down() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_event(
            ServiceEvent::ServiceRemoved(
                SERVICE_TYPE.to_string(),
                "light-1._tallylight._tcp.local.".to_string(),
            ),
            &tx,
        );
        match rx.try_recv().unwrap() {
            EngineEvent::ServiceDown { fqdn } => {
                assert_eq!(fqdn, "light-1._tallylight._tcp.local.");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
