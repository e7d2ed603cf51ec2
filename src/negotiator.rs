//! Session negotiation state machine
//!
//! ```text
//! Idle ──open──▶ Connecting ──connected──▶ Joining ──ack──▶ Active ──close──▶ Closed
//!                    │  ▲                     │                │
//!                    │  └──────retry──────┐   │                │
//!                    └───────error───────▶ Errored ◀───error───┴──(drop)
//! ```
//!
//! The negotiator only tracks state; the session manager performs the I/O.
//! Every connection attempt gets a fresh `Generation`, and events carrying
//! any other generation are stale.

use crate::error::{Result, SessionError};
use crate::types::{ConnectionPhase, Generation};
use std::fmt;

/// Negotiation state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NegotiatorState {
    #[default]
    Idle,
    Connecting,
    Joining,
    Active,
    Errored,
    Closed,
}

impl NegotiatorState {
    pub fn connection_phase(&self) -> ConnectionPhase {
        match self {
            NegotiatorState::Idle | NegotiatorState::Closed => ConnectionPhase::Disconnected,
            NegotiatorState::Connecting => ConnectionPhase::Connecting,
            NegotiatorState::Joining | NegotiatorState::Active => ConnectionPhase::Connected,
            NegotiatorState::Errored => ConnectionPhase::Errored,
        }
    }
}

impl fmt::Display for NegotiatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiatorState::Idle => "idle",
            NegotiatorState::Connecting => "connecting",
            NegotiatorState::Joining => "joining",
            NegotiatorState::Active => "active",
            NegotiatorState::Errored => "errored",
            NegotiatorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tracks the handshake state and the connection generation
#[derive(Debug, Default)]
pub struct Negotiator {
    state: NegotiatorState,
    generation: Generation,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True only once the join handshake completed on the live connection
    pub fn has_joined(&self) -> bool {
        self.state == NegotiatorState::Active
    }

    pub fn can_retry(&self) -> bool {
        self.state == NegotiatorState::Errored
    }

    /// Whether an event tagged with `generation` should be applied
    pub fn accepts(&self, generation: Generation) -> bool {
        self.state != NegotiatorState::Closed && generation == self.generation
    }

    /// Start a new connection attempt, superseding any current one
    pub fn begin_connect(&mut self) -> Result<Generation> {
        if self.state == NegotiatorState::Closed {
            return Err(SessionError::Closed);
        }
        self.generation = self.generation.next();
        self.transition(NegotiatorState::Connecting);
        Ok(self.generation)
    }

    /// Transport reported `connected`. Returns true on `Connecting → Joining`.
    pub fn on_connected(&mut self, generation: Generation) -> bool {
        if !self.accepts(generation) || self.state != NegotiatorState::Connecting {
            return false;
        }
        self.transition(NegotiatorState::Joining);
        true
    }

    /// Backend acknowledged the join. Returns true on `Joining → Active`.
    pub fn on_join_ack(&mut self, generation: Generation) -> bool {
        if !self.accepts(generation) || self.state != NegotiatorState::Joining {
            return false;
        }
        self.transition(NegotiatorState::Active);
        true
    }

    /// Connection attempt or live connection failed
    pub fn on_failure(&mut self, generation: Generation) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        match self.state {
            NegotiatorState::Connecting | NegotiatorState::Joining | NegotiatorState::Active => {
                self.transition(NegotiatorState::Errored);
                true
            }
            _ => false,
        }
    }

    /// Close the session. Bumps the generation so late events are dropped.
    pub fn close(&mut self) -> bool {
        if self.state == NegotiatorState::Closed {
            return false;
        }
        self.generation = self.generation.next();
        self.transition(NegotiatorState::Closed);
        true
    }

    fn transition(&mut self, to: NegotiatorState) {
        tracing::debug!(
            from = %self.state,
            to = %to,
            generation = %self.generation,
            "Session state transition"
        );
        self.state = to;
    }
}
