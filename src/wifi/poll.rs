//! Polling Wi-Fi adapter
//!
//! Derives identity-change events by periodically asking the OS
//! network tool for the current SSID and diffing against the last
//! observation. A native event-driven adapter can replace this behind
//! the same `WifiBackend` capability.

use super::{WifiBackend, WifiEvent};
use crate::command::netsetup::{parse_ssid_output, NetworkTool};
use crate::command::CommandRunner;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct PollingWifiBackend {
    runner: Arc<dyn CommandRunner>,
    tool: NetworkTool,
    interval: Duration,
}

impl PollingWifiBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, tool: NetworkTool) -> Self {
        Self {
            runner,
            tool,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn query_ssid(
        runner: &Arc<dyn CommandRunner>,
        tool: &NetworkTool,
    ) -> Result<Option<String>> {
        let (program, args) = tool.ssid_invocation();
        let output = runner.run(&program, &args).await?;
        if !output.success() {
            bail!(
                "SSID query exited with status {}: {}",
                output.status,
                output.stderr.trim()
            );
        }
        Ok(parse_ssid_output(&output.stdout))
    }
}

#[async_trait]
impl WifiBackend for PollingWifiBackend {
    async fn current_ssid(&self) -> Result<Option<String>> {
        Self::query_ssid(&self.runner, &self.tool).await
    }

    async fn events(&self) -> Result<mpsc::Receiver<WifiEvent>> {
        let (tx, rx) = mpsc::channel(16);
        let runner = self.runner.clone();
        let tool = self.tool.clone();
        let interval = self.interval;

        // Seed with the current association so subscribing does not
        // fire a spurious change event.
        let mut last = Self::query_ssid(&runner, &tool).await.unwrap_or(None);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // A failed query keeps the previous observation; it
                // does not count as a disassociation.
                let current = match Self::query_ssid(&runner, &tool).await {
                    Ok(current) => current,
                    Err(e) => {
                        debug!("SSID poll failed: {}", e);
                        continue;
                    }
                };

                if current != last {
                    debug!("SSID changed: {:?} -> {:?}", last, current);
                    last = current;
                    if tx.send(WifiEvent::IdentityChanged).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted SSID-query outputs in order, repeating the last
    /// one once the script runs out.
    struct SsidScript {
        outputs: Mutex<VecDeque<String>>,
        last: Mutex<String>,
    }

    impl SsidScript {
        fn new(outputs: &[&str]) -> Self {
            Self {
                outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
                last: Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for SsidScript {
        async fn run(&self, _program: &str, _args: &[String]) -> Result<CommandOutput> {
            let stdout = match self.outputs.lock().unwrap().pop_front() {
                Some(out) => {
                    *self.last.lock().unwrap() = out.clone();
                    out
                }
                None => self.last.lock().unwrap().clone(),
            };
            Ok(CommandOutput {
                status: 0,
                stdout,
                stderr: String::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_event_on_ssid_change() {
        let runner = Arc::new(SsidScript::new(&[
            "Current Wi-Fi Network: hongzhi\n", // seed query
            "Current Wi-Fi Network: hongzhi\n", // first poll, no change
            "Current Wi-Fi Network: TP-LINK_5G_m\n",
        ]));
        let backend = PollingWifiBackend::new(runner, NetworkTool::default())
            .with_interval(Duration::from_millis(10));

        let mut events = backend.events().await.unwrap();
        assert_eq!(events.recv().await, Some(WifiEvent::IdentityChanged));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disassociation_is_a_change() {
        let runner = Arc::new(SsidScript::new(&[
            "Current Wi-Fi Network: hongzhi\n",
            "You are not associated with an AirPort network.\n",
        ]));
        let backend = PollingWifiBackend::new(runner.clone(), NetworkTool::default())
            .with_interval(Duration::from_millis(10));

        let mut events = backend.events().await.unwrap();
        assert_eq!(events.recv().await, Some(WifiEvent::IdentityChanged));
        assert_eq!(backend.current_ssid().await.unwrap(), None);
    }
}
