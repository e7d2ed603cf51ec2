//! In-memory transport for testing and offline demos
//!
//! `MemoryTransport` never touches the network. A cloneable `MemoryBackend`
//! handle plays the server: it records everything the session sends and
//! can push connection and application events back at any time.

use super::{ConnectOptions, ConnectionHandle, EventSink, Transport, TransportEventKind};
use crate::error::{Result, SessionError};
use crate::protocol::{InboundEvent, OutboundEvent, WireMessage};
use crate::types::Generation;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Superseded connections kept reachable through `emit_on`
const RETAINED_SINKS: usize = 8;

/// Behaviour of the simulated backend
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Emit `Connected` as soon as `open` is called
    pub auto_connect: bool,

    /// Answer `join_chatbot` with `chatbot_connected`
    pub auto_join_ack: bool,
}

impl MemoryConfig {
    /// A backend that connects and acknowledges joins immediately
    pub fn responsive() -> Self {
        Self {
            auto_connect: true,
            auto_join_ack: true,
        }
    }
}

/// An event the session handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SentEvent {
    pub generation: Generation,
    pub event: OutboundEvent,
}

#[derive(Debug, Default)]
struct BackendState {
    current: Option<ConnectionHandle>,
    sinks: Vec<EventSink>,
    sent: Vec<SentEvent>,
    opens: usize,
    closes: usize,
    fail_next_open: Option<String>,
    fail_sends: Option<String>,
}

/// Server-side handle onto a `MemoryTransport`
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything sent so far, in order
    pub fn sent(&self) -> Vec<SentEvent> {
        self.lock().sent.clone()
    }

    /// Names of the events sent so far, in order
    pub fn sent_names(&self) -> Vec<&'static str> {
        self.lock().sent.iter().map(|s| s.event.name()).collect()
    }

    pub fn send_count(&self) -> usize {
        self.lock().sent.len()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Connections still reachable through `emit_on`
    pub fn sink_count(&self) -> usize {
        self.lock().sinks.len()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Generation of the live connection, if any
    pub fn generation(&self) -> Option<Generation> {
        self.lock().current.as_ref().map(|h| h.generation)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Make the next `open` call fail synchronously
    pub fn fail_next_open(&self, cause: impl Into<String>) {
        self.lock().fail_next_open = Some(cause.into());
    }

    /// Make every `send` fail until cleared with `None`
    pub fn fail_sends(&self, cause: Option<String>) {
        self.lock().fail_sends = cause;
    }

    /// Emit on the live connection. Returns false if nothing is connected.
    pub fn emit(&self, kind: TransportEventKind) -> bool {
        let state = self.lock();
        let Some(current) = state.current.as_ref() else {
            return false;
        };
        state
            .sinks
            .iter()
            .find(|s| s.generation() == current.generation)
            .map(|s| s.emit(kind))
            .unwrap_or(false)
    }

    /// Emit on any connection ever opened, including superseded ones
    pub fn emit_on(&self, generation: Generation, kind: TransportEventKind) -> bool {
        self.lock()
            .sinks
            .iter()
            .find(|s| s.generation() == generation)
            .map(|s| s.emit(kind))
            .unwrap_or(false)
    }

    pub fn connect(&self) -> bool {
        self.emit(TransportEventKind::Connected)
    }

    pub fn connect_error(&self, cause: impl Into<String>) -> bool {
        self.emit(TransportEventKind::ConnectionError {
            cause: cause.into(),
        })
    }

    /// Drop the live connection from the server side
    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        let emitted = self.emit(TransportEventKind::Disconnected {
            reason: reason.into(),
        });
        self.lock().current = None;
        emitted
    }

    pub fn inbound(&self, event: InboundEvent) -> bool {
        self.emit(TransportEventKind::Inbound(event))
    }

    pub fn join_ack(&self) -> bool {
        self.inbound(InboundEvent::ChatbotConnected(serde_json::json!({
            "message": "Connected to chatbot"
        })))
    }

    /// Send a bot reply with the given raw text
    pub fn bot_message(&self, text: impl Into<String>) -> bool {
        self.inbound(InboundEvent::ChatbotMessage(WireMessage {
            message_id: Some(format!("bot_{}", uuid::Uuid::new_v4().simple())),
            user_id: Some("chatbot".to_string()),
            username: Some("Unibot".to_string()),
            text: text.into(),
            kind: Some("bot".to_string()),
            ..Default::default()
        }))
    }

    pub fn bot_typing(&self, typing: bool) -> bool {
        self.inbound(InboundEvent::BotTyping { typing })
    }

    pub fn chatbot_error(&self, message: impl Into<String>) -> bool {
        self.inbound(InboundEvent::ChatbotError {
            message: message.into(),
        })
    }
}

/// Transport backed by a `MemoryBackend`
#[derive(Debug, Default)]
pub struct MemoryTransport {
    backend: MemoryBackend,
    config: MemoryConfig,
}

impl MemoryTransport {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            backend: MemoryBackend::default(),
            config,
        }
    }

    /// Handle for driving the simulated server
    pub fn backend(&self) -> MemoryBackend {
        self.backend.clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(
        &mut self,
        endpoint: &str,
        _options: &ConnectOptions,
        sink: EventSink,
    ) -> Result<ConnectionHandle> {
        let handle = ConnectionHandle {
            generation: sink.generation(),
            endpoint: endpoint.to_string(),
        };

        {
            let mut state = self.backend.lock();
            if let Some(previous) = state.current.take() {
                state.closes += 1;
                tracing::debug!(generation = %previous.generation, "Replacing memory connection");
            }
            if let Some(cause) = state.fail_next_open.take() {
                return Err(SessionError::Connection(cause));
            }
            state.opens += 1;
            state.current = Some(handle.clone());
            state.sinks.retain(|s| !s.is_closed());
            if state.sinks.len() >= RETAINED_SINKS {
                let excess = state.sinks.len() + 1 - RETAINED_SINKS;
                state.sinks.drain(..excess);
            }
            state.sinks.push(sink.clone());
        }

        if self.config.auto_connect {
            sink.connected();
        }

        Ok(handle)
    }

    async fn send(&self, handle: &ConnectionHandle, event: &OutboundEvent) -> Result<()> {
        let ack_join = {
            let mut state = self.backend.lock();
            if state.current.as_ref() != Some(handle) {
                return Err(SessionError::StaleConnection(handle.generation.value()));
            }
            if let Some(cause) = state.fail_sends.clone() {
                return Err(SessionError::Send {
                    event: event.name().to_string(),
                    reason: cause,
                });
            }
            state.sent.push(SentEvent {
                generation: handle.generation,
                event: event.clone(),
            });
            self.config.auto_join_ack && matches!(event, OutboundEvent::JoinChatbot(_))
        };

        if ack_join {
            self.backend.join_ack();
        }
        Ok(())
    }

    async fn close(&mut self, handle: &ConnectionHandle) -> Result<()> {
        let mut state = self.backend.lock();
        if state.current.as_ref() == Some(handle) {
            state.current = None;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.backend.is_connected()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
