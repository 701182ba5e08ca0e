mod applier;
mod command;
mod config;
mod error;
mod status;
mod wifi;

use applier::NetworkApplier;
use command::netsetup::NetworkTool;
use command::{CommandRunner, ProcessRunner};
use config::ConfigStore;
use status::{AppEvent, StatusPublisher};
use std::sync::Arc;
use tokio::sync::RwLock;
use wifi::poll::PollingWifiBackend;
use wifi::WiFiWatcher;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let store = ConfigStore::open(ConfigStore::default_path());
    info!(
        "loaded {} profile(s) from {}",
        store.len(),
        store.path().display()
    );
    let store = Arc::new(RwLock::new(store));

    let publisher = Arc::new(StatusPublisher::new());
    let mut events = publisher.subscribe().await;

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let tool = NetworkTool::default();

    let applier = NetworkApplier::new(
        store.clone(),
        runner.clone(),
        tool.clone(),
        publisher.clone(),
    );

    let backend = Arc::new(PollingWifiBackend::new(runner, tool));
    let watcher = WiFiWatcher::new(backend, applier.clone());
    let _watch_task = watcher.start();

    // Apply immediately for the network we are already on
    if let Some(ssid) = watcher.current_ssid().await {
        info!("currently associated with {}", ssid);
        applier.switch_to(ssid);
    }

    // Presentation boundary: surface engine events in the log. A menu
    // bar or notification frontend would subscribe the same way.
    while let Some(event) = events.recv().await {
        match event {
            AppEvent::LocationChanged { location } => {
                info!("location: {}", location);
            }
            AppEvent::StatusChanged { status } => {
                info!("status: {}", status);
            }
        }
    }
}
