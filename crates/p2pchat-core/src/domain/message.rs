//! Chat message value type.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One line of chat text.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The message text, without its line terminator.
    pub content: String,
    /// `true` for messages this side sent, `false` for messages from the peer.
    pub is_from_me: bool,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl ChatMessage {
    /// A message written by the local user.
    pub fn sent(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_from_me: true,
            timestamp_ms: current_timestamp_ms(),
        }
    }

    /// A message read from the peer stream.
    pub fn received(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_from_me: false,
            timestamp_ms: current_timestamp_ms(),
        }
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
