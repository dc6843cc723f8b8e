//! Client Session Pumps
//!
//! Each connection runs two loops:
//!
//! - **read pump** (this task): decodes commands and calls the Hub directly.
//!   The read deadline is `pong_wait` and only a pong extends it.
//! - **write pump** (spawned): drains the outbound queue, coalescing what is
//!   already queued into one newline-separated text frame, and pings every
//!   `ping_period`. A closed queue produces a close frame.
//!
//! The pumps share nothing but the queue and a cancellation token that the
//! write pump fires when it exits, so a dead writer also stops the reader.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::services::{ClientHandle, HubHandle};
use crate::domain::protocol::{Action, ClientCommand, Payload, ServerMessage};
use crate::infrastructure::config::WebSocketSettings;

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error("write deadline of {0:?} exceeded")]
    Deadline(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
}

/// Run a session until either side closes.
pub async fn run(socket: WebSocket, hub: HubHandle, settings: WebSocketSettings) {
    let (client, queue) = match hub.register().await {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting WebSocket connection");
            return;
        }
    };
    let id = client.id();
    tracing::info!(client_id = %id, "Client connected");

    let (sink, stream) = socket.split();
    let writer_done = CancellationToken::new();
    let writer = tokio::spawn(write_pump(
        sink,
        queue,
        settings.clone(),
        writer_done.clone(),
    ));

    read_pump(stream, &hub, &client, &settings, &writer_done).await;

    // Closing the queue lets the writer send a close frame and exit.
    hub.unregister(id).await;
    if let Err(e) = writer.await {
        tracing::error!(client_id = %id, error = %e, "Write pump panicked");
    }
    tracing::info!(client_id = %id, "Client disconnected");
}

// =============================================================================
// Read Pump
// =============================================================================

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: &HubHandle,
    client: &ClientHandle,
    settings: &WebSocketSettings,
    writer_done: &CancellationToken,
) {
    let id = client.id();
    let mut deadline = Instant::now() + settings.pong_wait;

    loop {
        let frame = tokio::select! {
            () = writer_done.cancelled() => break,
            frame = tokio::time::timeout_at(deadline, stream.next()) => frame,
        };

        let message = match frame {
            Err(_) => {
                tracing::debug!(client_id = %id, "Read deadline elapsed");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id = %id, error = %e, "Read error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => handle_command(text.as_str().as_bytes(), hub, client),
            Message::Binary(data) => handle_command(&data, hub, client),
            Message::Pong(_) => deadline = Instant::now() + settings.pong_wait,
            Message::Ping(_) => {}
            Message::Close(_) => break,
        }
    }
}

fn handle_command(body: &[u8], hub: &HubHandle, client: &ClientHandle) {
    let command = match ClientCommand::decode(body) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(client_id = %client.id(), "Malformed command");
            client.send(&ServerMessage::from(e));
            return;
        }
    };

    match command.action() {
        Ok(Action::Subscribe) => hub.subscribe(client.id(), &command.ticker),
        Ok(Action::Unsubscribe) => hub.unsubscribe(client.id(), &command.ticker),
        Err(e) => {
            tracing::debug!(client_id = %client.id(), action = %command.action, "Unknown action");
            client.send(&ServerMessage::from(e));
        }
    }
}

// =============================================================================
// Write Pump
// =============================================================================

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Payload>,
    settings: WebSocketSettings,
    done: CancellationToken,
) {
    let period = settings.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            payload = queue.recv() => {
                let Some(first) = payload else {
                    let _ = send_frame(&mut sink, Message::Close(None), settings.write_wait).await;
                    break;
                };
                let batch = coalesce(&first, &mut queue);
                send_frame(&mut sink, Message::Text(batch.into()), settings.write_wait).await
            }
            _ = ping.tick() => {
                send_frame(&mut sink, Message::Ping(Bytes::new()), settings.write_wait).await
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "Write failed, closing session");
            break;
        }
    }

    done.cancel();
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    wait: Duration,
) -> Result<(), WriteError> {
    tokio::time::timeout(wait, sink.send(message))
        .await
        .map_err(|_| WriteError::Deadline(wait))??;
    Ok(())
}

/// Join `first` with whatever was already queued when the write began.
fn coalesce(first: &str, queue: &mut mpsc::Receiver<Payload>) -> String {
    let pending = queue.len();
    let mut batch = String::from(first);
    for _ in 0..pending {
        let Ok(next) = queue.try_recv() else {
            break;
        };
        batch.push('\n');
        batch.push_str(&next);
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coalesce_joins_only_already_queued() {
        let (tx, mut rx) = mpsc::channel::<Payload>(8);
        for text in ["b", "c"] {
            tx.send(Payload::from(text)).await.unwrap();
        }

        assert_eq!(coalesce("a", &mut rx), "a\nb\nc");

        tx.send(Payload::from("d")).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn coalesce_single_message_is_unchanged() {
        let (_tx, mut rx) = mpsc::channel::<Payload>(8);
        assert_eq!(coalesce(r#"{"type":"subscribed"}"#, &mut rx), r#"{"type":"subscribed"}"#);
    }
}
