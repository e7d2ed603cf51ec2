//! Error types for unibot-session

use thiserror::Error;

/// Errors that can occur while managing a chat session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport could not be opened or the socket failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure handing an outbound event to the transport
    #[error("Failed to send event '{event}': {reason}")]
    Send {
        event: String,
        reason: String,
    },

    /// Operation targeted a connection that has since been replaced or closed
    #[error("Stale connection handle: generation {0}")]
    StaleConnection(u64),

    /// Malformed frame on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Language code outside the supported set
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Operation requires a language to have been chosen first
    #[error("No language selected")]
    LanguageNotSelected,

    /// State machine transition not allowed from the current state
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: String,
    },

    /// The session has been closed and cannot be reused
    #[error("Session closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// REST request failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Preference storage failure
    #[error("Preference store error: {0}")]
    Preferences(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
