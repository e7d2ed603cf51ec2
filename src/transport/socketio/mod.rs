//! Socket.IO transport
//!
//! Implements `Transport` over a WebSocket speaking the Engine.IO v4 /
//! Socket.IO v5 text protocol, which is what the chat backend serves.
//! Each `open` spawns one connection task; the task owns the socket,
//! answers heartbeats, and reports everything through the `EventSink`.

mod codec;
mod config;

pub use codec::{EnginePacket, Handshake, SocketPacket};
pub use config::{SocketIoConfig, ENGINE_IO_VERSION};

use super::{ConnectOptions, ConnectionHandle, EventSink, Transport};
use crate::error::{Result, SessionError};
use crate::protocol::{InboundEvent, OutboundEvent};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Disconnect reasons, matching the socket.io client's reason codes
pub mod reason {
    pub const IO_SERVER_DISCONNECT: &str = "io server disconnect";
    pub const TRANSPORT_CLOSE: &str = "transport close";
    pub const TRANSPORT_ERROR: &str = "transport error";
    pub const PING_TIMEOUT: &str = "ping timeout";
}

struct ActiveConnection {
    handle: ConnectionHandle,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// Socket.IO event-stream transport
pub struct SocketIoTransport {
    config: SocketIoConfig,
    active: Option<ActiveConnection>,
}

impl SocketIoTransport {
    pub fn new(config: SocketIoConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &SocketIoConfig {
        &self.config
    }

    fn shutdown_active(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(
                generation = %active.handle.generation,
                endpoint = %active.handle.endpoint,
                "Closing socket.io connection"
            );
            // Dropping the sender tells the task to say goodbye and exit
            drop(active.outbound);
            drop(active.task);
        }
    }
}

impl Default for SocketIoTransport {
    fn default() -> Self {
        Self::new(SocketIoConfig::default())
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn open(
        &mut self,
        endpoint: &str,
        options: &ConnectOptions,
        sink: EventSink,
    ) -> Result<ConnectionHandle> {
        self.shutdown_active();

        let url = self.config.websocket_url(endpoint)?;
        let handle = ConnectionHandle {
            generation: sink.generation(),
            endpoint: endpoint.to_string(),
        };
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = ConnectionTask {
            namespace: self.config.namespace().to_string(),
            auth: options.auth.clone(),
            connect_timeout: options.connect_timeout,
            sink,
            connected: false,
            ping_window: None,
        };

        tracing::info!(url = %url, generation = %handle.generation, "Opening socket.io connection");
        let join = tokio::spawn(task.run(url.to_string(), outbound_rx));

        self.active = Some(ActiveConnection {
            handle: handle.clone(),
            outbound: outbound_tx,
            task: join,
        });
        Ok(handle)
    }

    async fn send(&self, handle: &ConnectionHandle, event: &OutboundEvent) -> Result<()> {
        let active = match self.active.as_ref() {
            Some(active) if &active.handle == handle => active,
            _ => return Err(SessionError::StaleConnection(handle.generation.value())),
        };

        let packet = EnginePacket::Message(SocketPacket::event(
            self.config.namespace(),
            event.name(),
            event.payload()?,
        ));
        let frame = packet.encode()?;

        active.outbound.send(frame).map_err(|_| SessionError::Send {
            event: event.name().to_string(),
            reason: "connection task has stopped".to_string(),
        })?;

        tracing::debug!(event = event.name(), generation = %handle.generation, "Event queued");
        Ok(())
    }

    async fn close(&mut self, handle: &ConnectionHandle) -> Result<()> {
        if self.active.as_ref().map(|a| &a.handle) == Some(handle) {
            self.shutdown_active();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| !a.outbound.is_closed() && !a.task.is_finished())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "socketio"
    }
}

/// Upper bound on any timer derived from server or caller supplied values
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline `wait` from now, clamped to `MAX_WAIT`
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait.min(MAX_WAIT)).unwrap_or(now)
}

enum Step {
    Continue,
    Reply(EnginePacket),
    Stop,
}

/// State owned by one spawned connection
struct ConnectionTask {
    namespace: String,
    auth: Option<Value>,
    connect_timeout: Duration,
    sink: EventSink,
    connected: bool,
    /// Ping interval + ping timeout from the handshake
    ping_window: Option<Duration>,
}

impl ConnectionTask {
    async fn run(mut self, url: String, mut outbound: mpsc::UnboundedReceiver<String>) {
        let connect_deadline = deadline_after(self.connect_timeout);

        let ws = match tokio::time::timeout_at(connect_deadline, connect_async(url.as_str())).await {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "Socket.io connect failed");
                self.sink.connection_error(format!("{}: {}", url, e));
                return;
            }
            Err(_) => {
                tracing::warn!(url = %url, "Socket.io connect timed out");
                self.sink.connection_error(format!(
                    "timed out after {}ms connecting to {}",
                    self.connect_timeout.as_millis(),
                    url
                ));
                return;
            }
        };

        let (mut write, mut read) = ws.split();
        let mut deadline = connect_deadline;

        loop {
            tokio::select! {
                frame = read.next() => {
                    let step = match frame {
                        Some(Ok(Message::Text(text))) => self.on_frame(text.as_str(), &mut deadline),
                        Some(Ok(Message::Close(_))) | None => {
                            self.lost(reason::TRANSPORT_CLOSE);
                            Step::Stop
                        }
                        Some(Ok(_)) => Step::Continue,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Socket.io read failed");
                            self.lost(reason::TRANSPORT_ERROR);
                            Step::Stop
                        }
                    };
                    match step {
                        Step::Continue => {}
                        Step::Stop => break,
                        Step::Reply(packet) => {
                            let sent = match packet.encode() {
                                Ok(text) => write.send(Message::Text(text.into())).await.is_ok(),
                                Err(e) => {
                                    tracing::warn!(error = %e, "Failed to encode reply");
                                    true
                                }
                            };
                            if !sent {
                                self.lost(reason::TRANSPORT_ERROR);
                                break;
                            }
                        }
                    }
                }
                out = outbound.recv() => match out {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "Socket.io write failed");
                            self.lost(reason::TRANSPORT_ERROR);
                            break;
                        }
                    }
                    None => {
                        // Closed by the owning transport
                        let goodbye = EnginePacket::Message(SocketPacket::Disconnect {
                            namespace: self.namespace.clone(),
                        });
                        if let Ok(text) = goodbye.encode() {
                            let _ = write.send(Message::Text(text.into())).await;
                        }
                        let _ = write.close().await;
                        tracing::debug!(generation = %self.sink.generation(), "Socket.io connection closed by client");
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    if self.connected {
                        tracing::warn!(generation = %self.sink.generation(), "Socket.io ping timeout");
                        self.lost(reason::PING_TIMEOUT);
                    } else {
                        self.sink.connection_error(format!(
                            "timed out after {}ms waiting for namespace {}",
                            self.connect_timeout.as_millis(),
                            self.namespace
                        ));
                    }
                    let _ = write.close().await;
                    break;
                }
            }

            if self.sink.is_closed() {
                let _ = write.close().await;
                break;
            }
        }
    }

    fn on_frame(&mut self, text: &str, deadline: &mut Instant) -> Step {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, frame = %text, "Dropping undecodable frame");
                return Step::Continue;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                self.ping_window = Some(Duration::from_millis(
                    handshake.ping_interval.saturating_add(handshake.ping_timeout),
                ));
                tracing::debug!(sid = %handshake.sid, "Engine.io handshake received");
                Step::Reply(EnginePacket::Message(SocketPacket::Connect {
                    namespace: self.namespace.clone(),
                    data: self.auth.clone(),
                }))
            }
            EnginePacket::Ping(data) => {
                self.refresh(deadline);
                Step::Reply(EnginePacket::Pong(data))
            }
            EnginePacket::Close => {
                self.lost(reason::TRANSPORT_CLOSE);
                Step::Stop
            }
            EnginePacket::Message(packet) => self.on_socket_packet(packet, deadline),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => Step::Continue,
        }
    }

    fn on_socket_packet(&mut self, packet: SocketPacket, deadline: &mut Instant) -> Step {
        if packet.namespace() != self.namespace {
            tracing::trace!(namespace = packet.namespace(), "Ignoring packet for other namespace");
            return Step::Continue;
        }

        match packet {
            SocketPacket::Connect { .. } => {
                if !self.connected {
                    self.connected = true;
                    self.refresh(deadline);
                    tracing::info!(generation = %self.sink.generation(), "Socket.io connected");
                    self.sink.connected();
                }
                Step::Continue
            }
            SocketPacket::ConnectError { message, .. } => {
                self.sink.connection_error(message);
                Step::Stop
            }
            SocketPacket::Disconnect { .. } => {
                self.lost(reason::IO_SERVER_DISCONNECT);
                Step::Stop
            }
            SocketPacket::Event { name, args, .. } => {
                let payload = args.into_iter().next().unwrap_or(Value::Null);
                match InboundEvent::decode(&name, payload) {
                    Ok(event) => {
                        self.sink.inbound(event);
                    }
                    Err(e) => {
                        tracing::warn!(event = %name, error = %e, "Dropping malformed event");
                    }
                }
                Step::Continue
            }
            SocketPacket::Ack { .. } => Step::Continue,
        }
    }

    fn refresh(&self, deadline: &mut Instant) {
        if let Some(window) = self.ping_window {
            *deadline = deadline_after(window);
        }
    }

    /// Report the end of the stream: a disconnect once connected, a
    /// connection error before that
    fn lost(&self, why: &str) {
        if self.connected {
            self.sink.disconnected(why);
        } else {
            self.sink.connection_error(why);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportEvent, TransportEventKind};
    use crate::types::Generation;

    #[tokio::test]
    async fn test_open_unreachable_reports_connection_error() {
        let mut transport = SocketIoTransport::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<TransportEvent>();
        let options = ConnectOptions {
            connect_timeout: Duration::from_secs(2),
            auth: None,
        };

        // Port 9 (discard) is closed on test machines
        transport
            .open("http://127.0.0.1:9", &options, EventSink::new(Generation::new(1), tx))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.generation, Generation::new(1));
        assert!(matches!(event.kind, TransportEventKind::ConnectionError { .. }));
    }

    #[tokio::test]
    async fn test_open_invalid_endpoint_fails_synchronously() {
        let mut transport = SocketIoTransport::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = transport
            .open("nonsense", &ConnectOptions::default(), EventSink::new(Generation::new(1), tx))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert!(!transport.is_open());
    }

    fn task(sink: EventSink) -> ConnectionTask {
        ConnectionTask {
            namespace: "/".to_string(),
            auth: None,
            connect_timeout: Duration::from_secs(2),
            sink,
            connected: false,
            ping_window: None,
        }
    }

    #[tokio::test]
    async fn test_huge_ping_values_are_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel::<TransportEvent>();
        let mut task = task(EventSink::new(Generation::new(1), tx));
        let mut deadline = Instant::now();

        let open = format!(
            r#"0{{"sid":"abc","upgrades":[],"pingInterval":{max},"pingTimeout":{max}}}"#,
            max = u64::MAX
        );
        assert!(matches!(task.on_frame(&open, &mut deadline), Step::Reply(_)));
        assert_eq!(task.ping_window, Some(Duration::from_millis(u64::MAX)));

        let before = Instant::now();
        assert!(matches!(task.on_frame("2", &mut deadline), Step::Reply(_)));
        assert!(deadline > before);
        assert!(deadline <= Instant::now() + MAX_WAIT);
    }

    #[tokio::test]
    async fn test_deadline_after_clamps() {
        let now = Instant::now();
        let far = deadline_after(Duration::MAX);
        assert!(far >= now + MAX_WAIT);
        assert!(far <= Instant::now() + MAX_WAIT);

        let near = deadline_after(Duration::from_millis(50));
        assert!(near <= Instant::now() + Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_send_with_stale_handle() {
        let transport = SocketIoTransport::default();
        let handle = ConnectionHandle {
            generation: Generation::new(4),
            endpoint: "http://localhost:5000".to_string(),
        };
        let event = OutboundEvent::LanguageChanged(crate::protocol::LanguageChange {
            user_id: "u".to_string(),
            language: crate::language::Language::En,
        });
        let err = transport.send(&handle, &event).await.unwrap_err();
        assert!(matches!(err, SessionError::StaleConnection(4)));
    }
}
