//! Status event bus
//!
//! Decouples the reconfiguration engine from whatever presents its
//! progress (menu bar, logs, tests). Listeners subscribe explicitly and
//! each receives events in publish order.

use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// User-visible configuration status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// An apply attempt has started
    Configuring,
    /// A failed attempt is being retried after a short delay
    Retrying { attempt: u32, max: u32 },
    /// The configuration commands exited cleanly
    Succeeded,
    /// The OS-reported state matches the applied profile
    Verified,
    /// All retries exhausted
    Failed,
    /// No profile is stored for the current SSID
    NoProfileFound,
    /// retry was requested before any profile had been targeted
    NothingToRetry,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Configuring => write!(f, "configuring"),
            Status::Retrying { attempt, max } => write!(f, "retrying ({}/{})", attempt, max),
            Status::Succeeded => write!(f, "configuration succeeded"),
            Status::Verified => write!(f, "configuration verified"),
            Status::Failed => write!(f, "configuration failed"),
            Status::NoProfileFound => write!(f, "no profile found"),
            Status::NothingToRetry => write!(f, "nothing to retry"),
        }
    }
}

/// Events broadcast to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The active profile's location changed (e.g. office -> home)
    LocationChanged { location: String },
    /// The apply state machine reported progress
    StatusChanged { status: Status },
}

/// Fan-out publisher with per-listener FIFO delivery
pub struct StatusPublisher {
    subscribers: RwLock<Vec<mpsc::UnboundedSender<AppEvent>>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a new listener; events published from now on are
    /// delivered to it in order.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<AppEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.push(tx);
        rx
    }

    /// Deliver an event to every live listener. Listeners whose
    /// receiver was dropped are pruned here.
    pub async fn publish(&self, event: AppEvent) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub async fn publish_status(&self, status: Status) {
        self.publish(AppEvent::StatusChanged { status }).await;
    }

    pub async fn publish_location(&self, location: impl Into<String>) {
        self.publish(AppEvent::LocationChanged {
            location: location.into(),
        })
        .await;
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::Configuring.to_string(), "configuring");
        assert_eq!(
            Status::Retrying { attempt: 2, max: 3 }.to_string(),
            "retrying (2/3)"
        );
        assert_eq!(Status::Succeeded.to_string(), "configuration succeeded");
        assert_eq!(Status::Verified.to_string(), "configuration verified");
        assert_eq!(Status::Failed.to_string(), "configuration failed");
        assert_eq!(Status::NoProfileFound.to_string(), "no profile found");
        assert_eq!(Status::NothingToRetry.to_string(), "nothing to retry");
    }

    #[tokio::test]
    async fn test_listener_receives_in_order() {
        let publisher = StatusPublisher::new();
        let mut rx = publisher.subscribe().await;

        publisher.publish_status(Status::Configuring).await;
        publisher.publish_location("office").await;
        publisher.publish_status(Status::Verified).await;

        assert_eq!(
            rx.recv().await,
            Some(AppEvent::StatusChanged {
                status: Status::Configuring
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(AppEvent::LocationChanged {
                location: "office".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(AppEvent::StatusChanged {
                status: Status::Verified
            })
        );
    }

    #[tokio::test]
    async fn test_multiple_listeners() {
        let publisher = StatusPublisher::new();
        let mut a = publisher.subscribe().await;
        let mut b = publisher.subscribe().await;

        publisher.publish_status(Status::Failed).await;

        let expected = AppEvent::StatusChanged {
            status: Status::Failed,
        };
        assert_eq!(a.recv().await, Some(expected.clone()));
        assert_eq!(b.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let publisher = StatusPublisher::new();
        let rx = publisher.subscribe().await;
        let mut live = publisher.subscribe().await;
        drop(rx);

        publisher.publish_status(Status::Configuring).await;
        assert_eq!(publisher.subscribers.read().await.len(), 1);
        assert!(live.recv().await.is_some());
    }
}
