use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use tallyd::api;
use tallyd::config::ConfigDocument;
use tallyd::device::HttpDeviceClient;
use tallyd::engine::Context;
use tallyd::engine::Engine;
use tallyd::engine::StatusCache;
use tallyd::integrations;
use tallyd::integrations::obs::ObsConfig;
use tallyd::monitor;
use tallyd::registry::DeviceRegistry;
use tallyd::store::ConfigStore;
use tallyd::tracker::SwitcherTracker;

#[derive(Parser, Debug)]
#[command(name = "tallyd", about = "Tally light coordination daemon")]
struct Args {
    /// Path to the JSON configuration document.
    #[arg(long, default_value = "tally.json")]
    config: PathBuf,

    /// Address the control-panel API binds to.
    #[arg(long, default_value = "0.0.0.0")]
    listen: String,

    /// Port the control-panel API binds to.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    tracing::info!("tallyd starting");
    let doc = ConfigDocument::load(&args.config)?;
    tracing::info!(config = %args.config.display(), switcher = %doc.obs_address, "loaded config");

    let (events, rx) = mpsc::unbounded_channel();
    let client = Arc::new(HttpDeviceClient::new(doc.api_key.clone())?);
    let obs = ObsConfig {
        address: doc.obs_address.clone(),
        password: doc.obs_password.clone(),
    };
    let ctx = Arc::new(Context {
        registry: DeviceRegistry::new(),
        tracker: SwitcherTracker::new(),
        store: ConfigStore::new(args.config, doc, events.clone()),
        status: StatusCache::new(),
        client,
        events: events.clone(),
    });

    tokio::spawn(Engine::new(ctx.clone(), rx).run());
    tokio::spawn(monitor::run_liveness(ctx.clone()));
    tokio::spawn(monitor::run_info_poll(ctx.clone()));
    integrations::mdns::spawn(events.clone())?;
    tokio::spawn(integrations::obs::run(obs, events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for shutdown signal");
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    // Background tasks are torn down with the process; only the API server
    // shuts down gracefully.
    api::serve(args.listen, args.port, ctx, shutdown_rx).await?;

    tracing::info!("tallyd shutdown complete");
    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO", level);
            tracing::Level::INFO
        }
    }
}
