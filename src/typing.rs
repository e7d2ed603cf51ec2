//! Bot typing indicator

/// Why the typing indicator was cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingStop {
    BotMessage,
    BotIdle,
    ChatbotError,
    ConnectionLost,
}

/// Latest-state-wins typing flag
#[derive(Debug, Default)]
pub struct TypingCoordinator {
    typing: bool,
}

impl TypingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Raise the flag. Returns true if it was previously lowered.
    pub fn start(&mut self) -> bool {
        let changed = !self.typing;
        self.typing = true;
        if changed {
            tracing::trace!("Bot typing started");
        }
        changed
    }

    /// Lower the flag. Returns true if it was previously raised.
    pub fn stop(&mut self, reason: TypingStop) -> bool {
        let changed = self.typing;
        self.typing = false;
        if changed {
            tracing::trace!(?reason, "Bot typing stopped");
        }
        changed
    }

    /// Apply an inbound `bot_typing` event
    pub fn apply(&mut self, typing: bool) -> bool {
        if typing {
            self.start()
        } else {
            self.stop(TypingStop::BotIdle)
        }
    }
}
