//! Coordinating Loop
//!
//! Serializes client registration and the poll timer through one task.
//! Everything else (subscribe, unsubscribe, refresh) goes straight to the
//! [`Hub`] and synchronizes on its lock.
//!
//! ```text
//!  sessions ──Register/Unregister──► ┌──────────────┐
//!                                    │ coordinator  │──► Hub::poll_cycle (awaited)
//!  interval ───────tick────────────► └──────────────┘
//! ```
//!
//! A poll cycle is awaited inline, so an overrunning cycle delays the next
//! tick instead of overlapping with it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::client::ClientHandle;
use super::hub::Hub;
use crate::domain::protocol::Payload;
use crate::domain::subscription::ClientId;

const EVENT_QUEUE_CAPACITY: usize = 256;

/// Errors returned by [`HubHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The coordinating loop is no longer running.
    #[error("hub coordinating loop has stopped")]
    Stopped,
}

/// A registered client's handle and the receiving half of its queue.
pub type Registration = (Arc<ClientHandle>, mpsc::Receiver<Payload>);

/// Lifecycle events serialized by the coordinating loop.
#[derive(Debug)]
enum HubEvent {
    Register {
        client: Arc<ClientHandle>,
        ack: oneshot::Sender<()>,
    },
    Unregister(ClientId),
}

/// Cloneable handle used by sessions and HTTP handlers.
#[derive(Debug, Clone)]
pub struct HubHandle {
    hub: Arc<Hub>,
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// The underlying hub.
    #[must_use]
    pub const fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Register a new client and return its handle and queue receiver.
    ///
    /// Resolves once the coordinating loop has added the client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Stopped`] if the loop has exited.
    pub async fn register(&self) -> Result<Registration, HubError> {
        let (client, rx) =
            ClientHandle::new(ClientId::generate(), self.hub.config().client_queue_capacity);
        let (ack, acked) = oneshot::channel();

        self.events
            .send(HubEvent::Register {
                client: Arc::clone(&client),
                ack,
            })
            .await
            .map_err(|_| HubError::Stopped)?;
        acked.await.map_err(|_| HubError::Stopped)?;

        Ok((client, rx))
    }

    /// Unregister a client.
    ///
    /// Falls back to unregistering directly if the loop has already exited,
    /// so a session never leaves state behind.
    pub async fn unregister(&self, id: ClientId) {
        if self.events.send(HubEvent::Unregister(id)).await.is_err() {
            self.hub.unregister_client(id);
        }
    }

    /// Subscribe a client to a raw key.
    pub fn subscribe(&self, id: ClientId, raw: &str) {
        self.hub.subscribe(id, raw);
    }

    /// Unsubscribe a client from a raw key.
    pub fn unsubscribe(&self, id: ClientId, raw: &str) {
        self.hub.unsubscribe(id, raw);
    }
}

/// Start the coordinating loop.
///
/// The loop runs until `cancel` fires, then closes every client queue.
#[must_use]
pub fn spawn(hub: Arc<Hub>, cancel: CancellationToken) -> (HubHandle, JoinHandle<()>) {
    let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    hub.set_running(true);

    let task = tokio::spawn(run(Arc::clone(&hub), rx, cancel));
    (HubHandle { hub, events }, task)
}

async fn run(hub: Arc<Hub>, mut events: mpsc::Receiver<HubEvent>, cancel: CancellationToken) {
    let period = hub.config().poll_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        poll_interval_ms = period.as_millis(),
        workers = hub.gate().width(),
        "Hub coordinating loop started"
    );

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(event) = events.recv() => match event {
                HubEvent::Register { client, ack } => {
                    hub.register_client(client);
                    let _ = ack.send(());
                }
                HubEvent::Unregister(id) => {
                    hub.unregister_client(id);
                }
            },

            _ = ticker.tick() => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = hub.poll_cycle() => {}
                }
            }
        }
    }

    hub.set_running(false);
    hub.shutdown();
    tracing::info!("Hub coordinating loop stopped");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::application::ports::{FetchError, MockSnapshotFetcher};
    use crate::application::services::HubConfig;

    fn config() -> HubConfig {
        HubConfig {
            poll_interval: Duration::from_secs(5),
            ..HubConfig::default()
        }
    }

    #[tokio::test]
    async fn register_is_acknowledged() {
        let hub = Hub::new(Arc::new(MockSnapshotFetcher::new()), config());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(Arc::clone(&hub), cancel.clone());

        let (client, _rx) = handle.register().await.unwrap();
        assert_eq!(hub.stats().clients, 1);

        handle.unregister(client.id()).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(hub.stats().clients, 0);
        assert!(!hub.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_drive_poll_cycles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(move |k| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::NotFound(k.to_string()))
        });
        let hub = Hub::new(Arc::new(fetcher), config());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(Arc::clone(&hub), cancel.clone());

        let (client, _rx) = handle.register().await.unwrap();
        handle.subscribe(client.id(), "TSLA:NASDAQ");

        tokio::time::sleep(Duration::from_millis(15_100)).await;

        assert_eq!(hub.stats().poll_cycles, 3);
        // one immediate fetch plus one per cycle
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_closes_client_queues() {
        let hub = Hub::new(Arc::new(MockSnapshotFetcher::new()), config());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(Arc::clone(&hub), cancel.clone());
        let (_client, mut rx) = handle.register().await.unwrap();

        cancel.cancel();
        task.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert!(matches!(handle.register().await, Err(HubError::Stopped)));
    }

    #[tokio::test]
    async fn unregister_after_stop_still_cleans_up() {
        let hub = Hub::new(Arc::new(MockSnapshotFetcher::new()), config());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(Arc::clone(&hub), cancel.clone());
        let (client, _rx) = handle.register().await.unwrap();
        cancel.cancel();
        task.await.unwrap();

        handle.unregister(client.id()).await;
        assert_eq!(hub.stats().clients, 0);
    }
}
