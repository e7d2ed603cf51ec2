//! Chat session manager
//!
//! `SessionManager` owns one transport, the negotiation state machine, the
//! conversation log and the typing indicator. All state changes happen on
//! `&mut self`, either from a user action (`send_message`,
//! `switch_language`, ...) or from a transport event fed through
//! `handle_event`. Nothing here blocks waiting on the network: results of
//! `open` and `send` arrive later as events.

use crate::config::SessionConfig;
use crate::conversation::{ConversationLog, EchoOutcome, RenderedMessage};
use crate::error::{Result, SessionError};
use crate::language::Language;
use crate::negotiator::{Negotiator, NegotiatorState};
use crate::protocol::{
    CategorySelection, InboundEvent, JoinRequest, LanguageChange, OutboundEvent, UserMessage,
};
use crate::transport::{ConnectionHandle, EventSink, Transport, TransportEvent, TransportEventKind};
use crate::types::{ChatMessage, Generation, MessageId, SessionState, Sender};
use crate::typing::{TypingCoordinator, TypingStop};
use serde::Serialize;
use tokio::sync::mpsc;

/// Why a user action was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The join handshake has not completed on a live connection
    NotJoined,
    /// Nothing but whitespace
    EmptyMessage,
}

/// Result of a user send action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the transport; the id of the log entry created for it
    Sent(MessageId),
    /// Precondition failed; the transport was not touched
    Rejected(Rejection),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }
}

/// Result of a language switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSwitch {
    /// First choice before any connection: the session started connecting
    Selected,
    /// Mid-session change; `notified` is true if the backend was told
    Changed { notified: bool },
    /// Same as the current language; nothing happened
    Unchanged,
}

/// A recoverable problem surfaced to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum SessionFault {
    /// Connection could not be established or failed while sending
    Transport(String),
    /// Established connection dropped (reason code)
    Disconnected(String),
    /// Backend reported `chatbot_error`; the session stays usable
    Application(String),
}

impl SessionFault {
    /// Message to show the user in `language`
    pub fn user_message(&self, language: Language) -> String {
        match self {
            SessionFault::Transport(_) | SessionFault::Disconnected(_) => {
                language.strings().connection_error.to_string()
            }
            SessionFault::Application(message) => message.clone(),
        }
    }

    /// Whether the fault left the connection unusable
    pub fn is_connection_fault(&self) -> bool {
        !matches!(self, SessionFault::Application(_))
    }
}

/// Why `drive` returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The session was closed
    Closed,
    /// The connection failed and automatic retry is off or exhausted
    NeedsRetry(SessionFault),
    /// Nothing to drive: the session has not started connecting
    Idle,
}

/// Point-in-time view of a session for rendering
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub generation: Generation,
    pub fault: Option<SessionFault>,
    /// Localized fault text, if any
    pub fault_message: Option<String>,
    pub can_retry: bool,
    pub messages: Vec<RenderedMessage>,
}

/// Manages one chat session against a pluggable transport
pub struct SessionManager {
    config: SessionConfig,
    user_id: String,
    transport: Box<dyn Transport>,
    negotiator: Negotiator,
    handle: Option<ConnectionHandle>,
    language: Language,
    language_chosen: bool,
    log: ConversationLog,
    typing: TypingCoordinator,
    fault: Option<SessionFault>,
    retry_attempts: u32,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl SessionManager {
    /// Create an idle session. Nothing connects until `open` or a first
    /// language selection.
    pub fn new(config: SessionConfig, transport: impl Transport + 'static) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let user_id = config.resolve_user_id();
        let language = config.language.unwrap_or_default();
        let language_chosen = config.language.is_some();

        tracing::debug!(
            user_id = %user_id,
            transport = transport.name(),
            endpoint = %config.endpoint,
            "Session created"
        );

        Self {
            config,
            user_id,
            transport: Box::new(transport),
            negotiator: Negotiator::new(),
            handle: None,
            language,
            language_chosen,
            log: ConversationLog::new(),
            typing: TypingCoordinator::new(),
            fault: None,
            retry_attempts: 0,
            events_tx,
            events_rx,
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Start connecting with the chosen language
    pub async fn open(&mut self) -> Result<Generation> {
        if self.negotiator.state() == NegotiatorState::Closed {
            return Err(SessionError::Closed);
        }
        if !self.language_chosen {
            return Err(SessionError::LanguageNotSelected);
        }
        self.connect().await
    }

    /// Reconnect after an error, under a new generation
    pub async fn retry(&mut self) -> Result<Generation> {
        if !self.negotiator.can_retry() {
            return Err(SessionError::InvalidTransition {
                action: "retry",
                state: self.negotiator.state().to_string(),
            });
        }
        tracing::info!(generation = %self.negotiator.generation(), "Retrying connection");
        self.connect().await
    }

    /// Close the session: closes the transport and discards the log
    pub async fn close(&mut self) -> Result<()> {
        if !self.negotiator.close() {
            return Ok(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.transport.close(&handle).await {
                tracing::warn!(error = %e, "Failed to close transport");
            }
        }
        self.log.clear();
        self.typing.stop(TypingStop::ConnectionLost);
        self.fault = None;
        tracing::info!(user_id = %self.user_id, "Session closed");
        Ok(())
    }

    async fn connect(&mut self) -> Result<Generation> {
        let generation = self.negotiator.begin_connect()?;

        if let Some(previous) = self.handle.take() {
            if let Err(e) = self.transport.close(&previous).await {
                tracing::warn!(
                    generation = %previous.generation,
                    error = %e,
                    "Failed to close superseded connection"
                );
            }
        }
        self.fault = None;
        self.typing.stop(TypingStop::ConnectionLost);

        let sink = EventSink::new(generation, self.events_tx.clone());
        let options = self.config.connect_options();
        match self
            .transport
            .open(&self.config.endpoint, &options, sink)
            .await
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(generation)
            }
            Err(e) => {
                tracing::warn!(generation = %generation, error = %e, "Transport open failed");
                self.negotiator.on_failure(generation);
                self.fault = Some(SessionFault::Transport(e.to_string()));
                Err(e)
            }
        }
    }

    // ─── User actions ────────────────────────────────────────────

    /// Choose or change the language by code
    pub async fn switch_language(&mut self, code: &str) -> Result<LanguageSwitch> {
        let language: Language = code.parse()?;
        self.switch_to(language).await
    }

    /// Choose or change the language
    ///
    /// Before any connection exists this is the initial selection and starts
    /// connecting. Afterwards it updates the language in place, tells the
    /// backend if joined, and records a system entry; the connection is
    /// never reopened.
    pub async fn switch_to(&mut self, language: Language) -> Result<LanguageSwitch> {
        match self.negotiator.state() {
            NegotiatorState::Closed => return Err(SessionError::Closed),
            NegotiatorState::Idle => {
                self.language = language;
                self.language_chosen = true;
                tracing::info!(language = %language, "Language selected");
                self.connect().await?;
                return Ok(LanguageSwitch::Selected);
            }
            _ => {}
        }

        if language == self.language {
            return Ok(LanguageSwitch::Unchanged);
        }

        let previous = self.language;
        self.language = language;

        let mut notified = false;
        if self.negotiator.has_joined() {
            let event = OutboundEvent::LanguageChanged(LanguageChange {
                user_id: self.user_id.clone(),
                language,
            });
            match self.send_event(&event).await {
                Ok(()) => notified = true,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to notify backend of language change");
                }
            }
        }

        self.log.append(ChatMessage::system(language.changed_notice()));
        tracing::info!(from = %previous, to = %language, notified, "Language changed");
        Ok(LanguageSwitch::Changed { notified })
    }

    /// Send a typed message
    ///
    /// Rejected without touching the transport unless the session has
    /// joined. On success the message is in the log as pending and the
    /// typing indicator is raised.
    pub async fn send_message(&mut self, text: &str) -> Result<Dispatch> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Dispatch::Rejected(Rejection::EmptyMessage));
        }
        if !self.negotiator.has_joined() {
            tracing::debug!(state = %self.negotiator.state(), "Send rejected: not joined");
            return Ok(Dispatch::Rejected(Rejection::NotJoined));
        }

        let message = ChatMessage::pending_user(text);
        let id = message.id.clone();
        let event = OutboundEvent::UserMessage(UserMessage {
            message: text.to_string(),
            user_id: self.user_id.clone(),
            language: self.language,
            message_id: id.clone(),
        });

        self.send_or_fail(&event).await?;
        self.log.append(message);
        self.typing.start();
        Ok(Dispatch::Sent(id))
    }

    /// Pick one of the category suggestions attached to a bot message
    pub async fn select_category(&mut self, category_id: &str, title: &str) -> Result<Dispatch> {
        if !self.negotiator.has_joined() {
            return Ok(Dispatch::Rejected(Rejection::NotJoined));
        }

        let event = OutboundEvent::CategorySelected(CategorySelection {
            category_id: category_id.to_string(),
            category_title: title.to_string(),
            user_id: self.user_id.clone(),
            username: self.config.username.clone(),
            language: self.language,
        });
        self.send_or_fail(&event).await?;

        let message = ChatMessage::new(Sender::User, format!("Tell me about: {}", title));
        let id = message.id.clone();
        self.log.append(message);
        self.typing.start();
        Ok(Dispatch::Sent(id))
    }

    async fn send_event(&self, event: &OutboundEvent) -> Result<()> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| SessionError::Connection("no open connection".to_string()))?;
        self.transport.send(handle, event).await
    }

    /// Send, moving the session to `Errored` if the transport refuses
    async fn send_or_fail(&mut self, event: &OutboundEvent) -> Result<()> {
        if let Err(e) = self.send_event(event).await {
            tracing::warn!(event = event.name(), error = %e, "Send failed");
            let generation = self.negotiator.generation();
            self.fail(generation, SessionFault::Transport(e.to_string()))
                .await;
            return Err(e);
        }
        Ok(())
    }

    // ─── Transport events ────────────────────────────────────────

    /// Wait for the next transport event
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    /// Apply a transport event. Returns false if it was stale and dropped.
    pub async fn handle_event(&mut self, event: TransportEvent) -> bool {
        let generation = event.generation;
        if !self.negotiator.accepts(generation) {
            tracing::trace!(
                generation = %generation,
                current = %self.negotiator.generation(),
                "Dropping stale transport event"
            );
            return false;
        }

        match event.kind {
            TransportEventKind::Connected => {
                if self.negotiator.on_connected(generation) {
                    self.retry_attempts = 0;
                    self.join().await;
                }
            }
            TransportEventKind::ConnectionError { cause } => {
                self.fail(generation, SessionFault::Transport(cause)).await;
            }
            TransportEventKind::Disconnected { reason } => {
                self.fail(generation, SessionFault::Disconnected(reason)).await;
            }
            TransportEventKind::Inbound(inbound) => self.apply_inbound(generation, inbound),
        }
        true
    }

    /// Wait for one event and apply it
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event).await,
            None => false,
        }
    }

    /// Apply every event already queued, without waiting. Returns how many
    /// were applied (stale ones excluded).
    pub async fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event).await {
                applied += 1;
            }
        }
        applied
    }

    /// Process events until the session closes or needs a manual retry,
    /// reconnecting automatically per the configured `ReconnectPolicy`
    pub async fn drive(&mut self) -> Result<DriveOutcome> {
        loop {
            match self.negotiator.state() {
                NegotiatorState::Closed => return Ok(DriveOutcome::Closed),
                NegotiatorState::Idle => return Ok(DriveOutcome::Idle),
                NegotiatorState::Errored => {
                    let attempt = self.retry_attempts + 1;
                    match self.config.reconnect.delay_for(attempt) {
                        Some(delay) => {
                            self.retry_attempts = attempt;
                            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                            tokio::time::sleep(delay).await;
                            if let Err(e) = self.retry().await {
                                tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                            }
                            continue;
                        }
                        None => {
                            let fault = self
                                .fault
                                .clone()
                                .unwrap_or_else(|| SessionFault::Transport("unknown".to_string()));
                            return Ok(DriveOutcome::NeedsRetry(fault));
                        }
                    }
                }
                _ => {}
            }

            match self.next_event().await {
                Some(event) => {
                    self.handle_event(event).await;
                }
                None => return Ok(DriveOutcome::Closed),
            }
        }
    }

    async fn join(&mut self) {
        let event = OutboundEvent::JoinChatbot(JoinRequest {
            user_id: self.user_id.clone(),
            username: self.config.username.clone(),
            language: self.language,
        });
        if self.send_or_fail(&event).await.is_ok() {
            tracing::debug!(user_id = %self.user_id, language = %self.language, "Join requested");
        }
    }

    async fn fail(&mut self, generation: Generation, fault: SessionFault) {
        if !self.negotiator.on_failure(generation) {
            return;
        }
        tracing::warn!(generation = %generation, fault = ?fault, "Session errored");
        self.typing.stop(TypingStop::ConnectionLost);
        self.fault = Some(fault);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.transport.close(&handle).await {
                tracing::debug!(error = %e, "Failed to close errored connection");
            }
        }
    }

    fn apply_inbound(&mut self, generation: Generation, event: InboundEvent) {
        match event {
            InboundEvent::ChatbotConnected(data) => {
                if self.negotiator.on_join_ack(generation) {
                    tracing::info!(generation = %generation, data = %data, "Chatbot session established");
                }
            }
            InboundEvent::ChatbotMessage(wire) => {
                self.typing.stop(TypingStop::BotMessage);
                if !self.log.append(wire.into_chat_message(Sender::Bot)) {
                    tracing::debug!(generation = %generation, "Ignoring redelivered bot message");
                }
            }
            InboundEvent::MessageSent(wire) => {
                match self.log.reconcile_echo(wire.into_chat_message(Sender::User)) {
                    EchoOutcome::Appended => {
                        tracing::trace!("Echo did not match a pending message");
                    }
                    EchoOutcome::Duplicate => {
                        tracing::debug!(generation = %generation, "Ignoring repeated echo");
                    }
                    EchoOutcome::Confirmed => {}
                }
            }
            InboundEvent::BotTyping { typing } => {
                self.typing.apply(typing);
            }
            InboundEvent::ChatbotError { message } => {
                tracing::warn!(message = %message, "Chatbot error");
                self.typing.stop(TypingStop::ChatbotError);
                self.fault = Some(SessionFault::Application(message));
            }
            InboundEvent::Other { name, .. } => {
                tracing::debug!(event = %name, "Ignoring unhandled event");
            }
        }
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        SessionState {
            connection_phase: self.negotiator.state().connection_phase(),
            language: self.language,
            is_bot_typing: self.typing.is_typing(),
            has_joined: self.negotiator.has_joined(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            generation: self.negotiator.generation(),
            fault: self.fault.clone(),
            fault_message: self.fault.as_ref().map(|f| f.user_message(self.language)),
            can_retry: self.negotiator.can_retry(),
            messages: self.log.render(),
        }
    }

    pub fn negotiator_state(&self) -> NegotiatorState {
        self.negotiator.state()
    }

    pub fn generation(&self) -> Generation {
        self.negotiator.generation()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn fault(&self) -> Option<&SessionFault> {
        self.fault.as_ref()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn language_chosen(&self) -> bool {
        self.language_chosen
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }
}
