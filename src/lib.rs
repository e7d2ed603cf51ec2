//! # unibot-session
//!
//! Client-side chat session management for the Unibot university assistant.
//!
//! ## Overview
//!
//! `unibot-session` keeps one real-time conversation with the chatbot backend
//! consistent: it negotiates the join handshake, keeps an ordered message
//! log, tracks the bot typing indicator and switches language mid-session.
//! The wire transport is pluggable; Socket.IO over WebSocket is built in and
//! an in-memory transport is provided for tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use unibot_session::{Language, SessionConfig, SessionManager};
//! use unibot_session::transport::memory::{MemoryConfig, MemoryTransport};
//!
//! # async fn example() -> unibot_session::Result<()> {
//! let transport = MemoryTransport::new(MemoryConfig::responsive());
//! let backend = transport.backend();
//! let mut session = SessionManager::new(SessionConfig::default(), transport);
//!
//! // Choosing a language starts connecting
//! session.switch_to(Language::En).await?;
//! session.drain().await;
//! assert!(session.state().has_joined);
//!
//! session.send_message("What are the admission deadlines?").await?;
//! backend.bot_message("Applications close on 15 July.");
//! session.drain().await;
//!
//! for message in session.snapshot().messages {
//!     println!("{:?}: {}", message.sender, message.display_text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **socketio**: Engine.IO v4 / Socket.IO v5 over WebSocket
//! - **memory**: scripted in-process backend for testing
//!
//! ## Architecture
//!
//! - **Transport** trait: opens connections and emits generation-tagged events
//! - **SessionManager**: owns the transport, negotiator, log and typing state
//! - **Negotiator**: `Idle → Connecting → Joining → Active` state machine
//! - **ConversationLog**: ordered messages with envelope rendering

pub mod api;
pub mod config;
pub mod conversation;
pub mod envelope;
pub mod error;
pub mod language;
pub mod negotiator;
pub mod prefs;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;
pub mod typing;

// Re-export core types
pub use config::{ReconnectPolicy, SessionConfig};
pub use conversation::{ConversationLog, EchoOutcome, RenderedMessage};
pub use envelope::MessageContent;
pub use error::{Result, SessionError};
pub use language::{Language, Translations};
pub use negotiator::{Negotiator, NegotiatorState};
pub use protocol::{InboundEvent, OutboundEvent, WireMessage};
pub use session::{
    Dispatch, DriveOutcome, LanguageSwitch, Rejection, SessionFault, SessionManager,
    SessionSnapshot,
};
pub use transport::{
    ConnectOptions, ConnectionHandle, EventSink, Transport, TransportEvent, TransportEventKind,
};
pub use types::{
    CategorySuggestion, ChatMessage, ConnectionPhase, Delivery, Generation, MessageId, Sender,
    SessionState,
};
pub use typing::TypingCoordinator;

// Re-export transports for convenience
pub use transport::memory::{MemoryBackend, MemoryConfig, MemoryTransport};
pub use transport::socketio::{SocketIoConfig, SocketIoTransport};
