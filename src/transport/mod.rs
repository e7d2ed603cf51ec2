//! Transport trait: the core abstraction for chat backend connections
//!
//! A transport owns at most one live bidirectional event stream. `open` and
//! `send` are fire-and-forget: connection progress and inbound traffic are
//! reported later through the `EventSink` handed to `open`, with every event
//! tagged by the connection's `Generation`.

use crate::error::Result;
use crate::protocol::{InboundEvent, OutboundEvent};
use crate::types::Generation;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

pub mod memory;
pub mod socketio;

/// Identifies one opened connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub generation: Generation,
    pub endpoint: String,
}

/// Per-connection options
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How long the transport may take to reach `Connected`
    pub connect_timeout: Duration,

    /// Optional auth payload sent with the namespace connect
    pub auth: Option<serde_json::Value>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            auth: None,
        }
    }
}

/// What happened on a connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Stream established; the join handshake may start
    Connected,
    /// Connection could not be established (human-readable cause)
    ConnectionError { cause: String },
    /// Established connection went away (reason code)
    Disconnected { reason: String },
    /// Application event from the backend
    Inbound(InboundEvent),
}

/// A transport event tagged with the connection that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub generation: Generation,
    pub kind: TransportEventKind,
}

/// Delivery channel for one connection's events
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Deliver an event. Returns false once the receiving session is gone.
    pub fn emit(&self, kind: TransportEventKind) -> bool {
        self.tx
            .send(TransportEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }

    pub fn connected(&self) -> bool {
        self.emit(TransportEventKind::Connected)
    }

    pub fn connection_error(&self, cause: impl Into<String>) -> bool {
        self.emit(TransportEventKind::ConnectionError {
            cause: cause.into(),
        })
    }

    pub fn disconnected(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEventKind::Disconnected {
            reason: reason.into(),
        })
    }

    pub fn inbound(&self, event: InboundEvent) -> bool {
        self.emit(TransportEventKind::Inbound(event))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Core trait for chat backend connections
///
/// Only the session manager opens and closes a transport; everything else
/// sends through it or consumes its events.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting to `endpoint`
    ///
    /// Returning `Ok` does not mean the connection is up; wait for a
    /// `Connected` event on `sink`. An existing connection is closed first.
    async fn open(
        &mut self,
        endpoint: &str,
        options: &ConnectOptions,
        sink: EventSink,
    ) -> Result<ConnectionHandle>;

    /// Queue an event on the connection identified by `handle`
    async fn send(&self, handle: &ConnectionHandle, event: &OutboundEvent) -> Result<()>;

    /// Close the connection. Closing an already closed handle is a no-op.
    async fn close(&mut self, handle: &ConnectionHandle) -> Result<()>;

    /// Whether a connection is currently held
    fn is_open(&self) -> bool;

    /// Transport name (e.g., "socketio", "memory")
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Generation::new(3), tx);

        assert!(sink.connected());
        assert!(sink.disconnected("io server disconnect"));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.generation, Generation::new(3));
        assert_eq!(first.kind, TransportEventKind::Connected);

        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.kind,
            TransportEventKind::Disconnected {
                reason: "io server disconnect".to_string()
            }
        );
    }

    #[test]
    fn test_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Generation::default(), tx);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.connected());
    }
}
