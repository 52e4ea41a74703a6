//! Connection lifecycle states.
//!
//! ```text
//!                 start_server            inbound accepted
//! Disconnected ───────────────> Listening ────────────────> Connected(peer)
//!      │                                                       │   │
//!      │ connect_to_peer        connect ok                     │   │ read/write fault
//!      └──────────────> Connecting ──────> Connected(addr) ────┘   └──────> Error(msg)
//!                           │                                  │
//!                           └── fail / timeout ──> Error(msg)  └─ EOF ──> Disconnected
//!
//! Any state ── stop_connection ──> Disconnected
//! ```

use serde::{Deserialize, Serialize};

/// The state of a connection manager.  Exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No socket is open.  Initial state, and the state after every stop.
    #[default]
    Disconnected,
    /// The host role has bound a listening socket and awaits a peer.
    Listening,
    /// The joiner role is attempting an outbound connection.
    Connecting,
    /// A peer stream is open.
    Connected {
        /// Textual address of the remote peer.
        peer_address: String,
    },
    /// A bind, connect, or stream fault occurred.
    ///
    /// Transient: the caller either stops the connection or starts a fresh
    /// attempt, and both begin with a full teardown.
    Error {
        /// Human-readable description of the fault.
        message: String,
    },
}

impl ConnectionState {
    /// Builds a `Connected` state for `peer_address`.
    pub fn connected(peer_address: impl Into<String>) -> Self {
        Self::Connected {
            peer_address: peer_address.into(),
        }
    }

    /// Builds an `Error` state carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` while a peer stream is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Short lowercase label for status displays (`"connected"`, `"error"`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Listening => "listening",
            Self::Connecting => "connecting",
            Self::Connected { .. } => "connected",
            Self::Error { .. } => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Listening => f.write_str("Listening for a peer"),
            Self::Connecting => f.write_str("Connecting"),
            Self::Connected { peer_address } => write!(f, "Connected to {peer_address}"),
            Self::Error { message } => write!(f, "Error: {message}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_is_connected_only_for_connected_variant() {
        // Arrange
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Listening,
            ConnectionState::Connecting,
            ConnectionState::error("boom"),
        ];

        // Assert
        for state in &states {
            assert!(!state.is_connected(), "{state:?} must not report connected");
        }
        assert!(ConnectionState::connected("::1").is_connected());
    }

    #[test]
    fn test_display_includes_peer_address_and_error_message() {
        assert_eq!(
            ConnectionState::connected("fe80::1").to_string(),
            "Connected to fe80::1"
        );
        assert_eq!(
            ConnectionState::error("connection refused").to_string(),
            "Error: connection refused"
        );
    }

    #[test]
    fn test_label_is_stable_per_variant() {
        assert_eq!(ConnectionState::Listening.label(), "listening");
        assert_eq!(ConnectionState::connected("::1").label(), "connected");
        assert_eq!(ConnectionState::error("x").label(), "error");
    }
}
