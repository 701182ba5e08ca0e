//! Wi-Fi identity watching
//!
//! The platform adapter is a capability behind `WifiBackend`; the
//! watcher bridges its event stream to the applier. Subscription
//! failure leaves the watcher inert but never brings the daemon down.

pub mod poll;

use crate::applier::NetworkApplier;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events surfaced by a platform Wi-Fi adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    /// The associated network (SSID) changed, including dis/association
    IdentityChanged,
    /// The interface was powered on or off. Reserved; no action yet.
    PowerChanged,
}

/// Platform access to the wireless interface
#[async_trait]
pub trait WifiBackend: Send + Sync + 'static {
    /// Currently associated SSID, or None when disconnected.
    async fn current_ssid(&self) -> Result<Option<String>>;

    /// Subscribe to identity and power events.
    async fn events(&self) -> Result<mpsc::Receiver<WifiEvent>>;
}

/// Bridges SSID changes to the applier
pub struct WiFiWatcher<B: WifiBackend> {
    backend: Arc<B>,
    applier: NetworkApplier,
}

impl<B: WifiBackend> WiFiWatcher<B> {
    pub fn new(backend: Arc<B>, applier: NetworkApplier) -> Self {
        Self { backend, applier }
    }

    /// Synchronous-style SSID query, usable at startup to trigger an
    /// immediate initial switch. Query failures are logged and read as
    /// "not associated".
    pub async fn current_ssid(&self) -> Option<String> {
        match self.backend.current_ssid().await {
            Ok(ssid) => ssid,
            Err(e) => {
                warn!("failed to read current SSID: {}", e);
                None
            }
        }
    }

    /// Start watching. The returned handle finishes when the backend's
    /// event stream ends or the subscription failed.
    pub fn start(&self) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let applier = self.applier.clone();

        tokio::spawn(async move {
            let mut events = match backend.events().await {
                Ok(events) => {
                    info!("Wi-Fi monitoring started");
                    events
                }
                Err(e) => {
                    warn!("failed to subscribe to Wi-Fi events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.recv().await {
                match event {
                    WifiEvent::IdentityChanged => match backend.current_ssid().await {
                        Ok(Some(ssid)) => {
                            info!("SSID changed to {}", ssid);
                            applier.switch_to(ssid);
                        }
                        Ok(None) => {
                            debug!("disconnected from Wi-Fi, nothing to apply");
                        }
                        Err(e) => {
                            warn!("failed to read current SSID: {}", e);
                        }
                    },
                    WifiEvent::PowerChanged => {
                        debug!("Wi-Fi power state changed");
                    }
                }
            }

            debug!("Wi-Fi event stream ended");
        })
    }
}
