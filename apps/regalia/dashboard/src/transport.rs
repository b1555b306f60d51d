//! Reconnecting websocket subscription to the relay.
//!
//! The transport never gives up: every failed attempt or dropped connection
//! is followed by the same fixed delay and a fresh attempt, for as long as
//! someone is listening for its events.

use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting…",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected (retrying)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    /// A payload exactly as received, in receipt order.
    Frame(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),
    #[error("websocket receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
    #[error("relay closed the connection")]
    Closed,
    #[error("no one is listening for transport events")]
    Abandoned,
}

pub struct ReconnectingTransport {
    url: Url,
    retry_delay: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ReconnectingTransport {
    pub fn new(
        url: Url,
        retry_delay: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            url,
            retry_delay,
            events,
        }
    }

    /// Starts connecting right away. The task ends only once the event
    /// receiver is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            if !self.emit(TransportEvent::Status(ConnectionStatus::Connecting)) {
                return;
            }

            match self.session().await {
                Err(TransportError::Abandoned) => return,
                Err(err) => {
                    warn!(url = %self.url, attempt, error = %err, "relay connection lost");
                }
                Ok(()) => {}
            }

            if !self.emit(TransportEvent::Status(ConnectionStatus::Disconnected)) {
                return;
            }
            debug!(delay_ms = self.retry_delay.as_millis() as u64, "scheduling reconnect");
            sleep(self.retry_delay).await;
        }
    }

    /// One connection lifetime: handshake, then forward frames until the
    /// socket ends. Always ends in an error describing why.
    async fn session(&self) -> Result<(), TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(TransportError::Handshake)?;
        info!(url = %self.url, "connected to relay");
        if !self.emit(TransportEvent::Status(ConnectionStatus::Connected)) {
            return Err(TransportError::Abandoned);
        }

        // Outbound traffic is never needed; pings are answered by tungstenite
        // when the read half is polled.
        let (_write, mut read) = stream.split();
        while let Some(message) = read.next().await {
            let payload = match message.map_err(TransportError::Receive)? {
                Message::Text(text) => text,
                Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                Message::Close(_) => return Err(TransportError::Closed),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            if !self.emit(TransportEvent::Frame(payload)) {
                return Err(TransportError::Abandoned);
            }
        }
        Err(TransportError::Closed)
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Convenience wrapper returning the event stream alongside the task.
pub fn spawn_transport(
    url: Url,
    retry_delay: Duration,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = ReconnectingTransport::new(url, retry_delay, tx).spawn();
    (task, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use std::time::Instant;
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/ws", listener.local_addr().unwrap())).unwrap();
        (listener, url)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        rx.recv().await.expect("transport still running")
    }

    #[test_timeout::tokio_timeout_test(20)]
    async fn retries_every_second_after_failed_handshakes() {
        let (listener, url) = local_listener().await;
        let (task, mut events) = spawn_transport(url, DEFAULT_RETRY_DELAY);

        let mut accepted = Vec::new();
        for _ in 0..3 {
            let (stream, _) = listener.accept().await.unwrap();
            accepted.push(Instant::now());
            // Hang up before the websocket handshake completes.
            drop(stream);
        }

        for pair in accepted.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(1000), "retried too early: {gap:?}");
            assert!(gap < Duration::from_millis(1500), "retried too late: {gap:?}");
        }

        let statuses: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            &statuses[..4],
            &[
                TransportEvent::Status(ConnectionStatus::Connecting),
                TransportEvent::Status(ConnectionStatus::Disconnected),
                TransportEvent::Status(ConnectionStatus::Connecting),
                TransportEvent::Status(ConnectionStatus::Disconnected),
            ]
        );
        task.abort();
    }

    #[test_timeout::tokio_timeout_test(20)]
    async fn forwards_frames_and_reconnects_after_close() {
        let (listener, url) = local_listener().await;
        let (task, mut events) = spawn_transport(url, Duration::from_millis(100));

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = tokio_tungstenite::accept_async(stream).await.unwrap();
        server
            .send(Message::Text(r#"{"kmph": 42}"#.into()))
            .await
            .unwrap();
        server.send(Message::Text("raw line".into())).await.unwrap();
        server.close(None).await.unwrap();

        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Connecting)
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Connected)
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Frame(r#"{"kmph": 42}"#.into())
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Frame("raw line".into())
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Disconnected)
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Connecting)
        );

        // The retry reaches the listener again.
        let (_again, _) = listener.accept().await.unwrap();
        task.abort();
    }

    #[test_timeout::tokio_timeout_test(20)]
    async fn waits_a_second_after_an_established_session_drops() {
        let (listener, url) = local_listener().await;
        let (task, mut events) = spawn_transport(url, DEFAULT_RETRY_DELAY);

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = tokio_tungstenite::accept_async(stream).await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Connecting)
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Connected)
        );

        let dropped_at = Instant::now();
        server.close(None).await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Status(ConnectionStatus::Disconnected)
        );

        let (_again, _) = listener.accept().await.unwrap();
        let gap = dropped_at.elapsed();
        assert!(gap >= Duration::from_millis(1000), "retried too early: {gap:?}");
        assert!(gap < Duration::from_millis(1500), "retried too late: {gap:?}");
        task.abort();
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn stops_when_the_receiver_is_dropped() {
        let (_listener, url) = local_listener().await;
        let (task, events) = spawn_transport(url, Duration::from_millis(10));
        drop(events);
        task.await.unwrap();
    }
}
