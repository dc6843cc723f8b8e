//! Client Handle
//!
//! The Hub's side of a client session: identity plus the sending half of a
//! bounded outbound queue. The session's write pump owns the receiving half.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::protocol::{MessageType, Payload, ServerMessage};
use crate::domain::subscription::ClientId;
use crate::infrastructure::metrics;

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message accepted into the queue.
    Queued,
    /// Queue was full; the message was discarded.
    Dropped,
    /// Queue is closed; the client is gone.
    Closed,
}

/// Outbound queue handle for one connected client.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    sender: Mutex<Option<mpsc::Sender<Payload>>>,
}

impl ClientHandle {
    /// Create a handle and the matching queue receiver.
    #[must_use]
    pub fn new(id: ClientId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Arc::new(Self {
            id,
            sender: Mutex::new(Some(tx)),
        });
        (handle, rx)
    }

    /// The client's identifier.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Enqueue a payload without blocking.
    ///
    /// A full queue drops this one message for this one client.
    pub fn try_send(&self, payload: Payload, msg_type: MessageType) -> Delivery {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Delivery::Closed;
        };

        match sender.try_send(payload) {
            Ok(()) => {
                metrics::record_message_sent(msg_type);
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                metrics::record_message_dropped(msg_type);
                tracing::warn!(
                    client_id = %self.id,
                    message_type = msg_type.as_str(),
                    "Client queue full, dropping message"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Encode and enqueue a single message.
    pub fn send(&self, message: &ServerMessage) -> Delivery {
        match message.encode() {
            Ok(payload) => self.try_send(payload, message.kind),
            Err(e) => {
                tracing::error!(client_id = %self.id, error = %e, "Failed to encode message");
                Delivery::Dropped
            }
        }
    }

    /// Close the queue so the write pump drains and exits.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Whether the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_none_or(mpsc::Sender::is_closed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> Payload {
        Payload::from(text)
    }

    #[tokio::test]
    async fn queued_message_reaches_receiver() {
        let (client, mut rx) = ClientHandle::new(ClientId::from_raw(1), 4);

        assert_eq!(
            client.try_send(payload("a"), MessageType::Subscribed),
            Delivery::Queued
        );
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn full_queue_drops_newest() {
        let (client, mut rx) = ClientHandle::new(ClientId::from_raw(1), 1);

        assert_eq!(
            client.try_send(payload("first"), MessageType::StockUpdate),
            Delivery::Queued
        );
        assert_eq!(
            client.try_send(payload("second"), MessageType::StockUpdate),
            Delivery::Dropped
        );
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_happens_once_and_ends_receiver() {
        let (client, mut rx) = ClientHandle::new(ClientId::from_raw(1), 4);

        assert!(client.close());
        assert!(!client.close());
        assert!(client.is_closed());
        assert_eq!(
            client.try_send(payload("late"), MessageType::Unsubscribed),
            Delivery::Closed
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (client, rx) = ClientHandle::new(ClientId::from_raw(1), 4);
        drop(rx);

        assert!(client.is_closed());
        assert_eq!(
            client.try_send(payload("x"), MessageType::Subscribed),
            Delivery::Closed
        );
    }
}
